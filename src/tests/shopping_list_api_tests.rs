#[cfg(test)]
mod tests {
    use axum::http::{header, Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    use crate::tests::common::{setup_test_app, TestApp};

    /// Two cart recipes sharing flour; returns the shopper's token.
    async fn filled_cart(t: &TestApp) -> String {
        let (_, token) = t.signup("shopper").await;
        let tag = t.tag("lunch", "#49B64E").await;
        let flour = t.ingredient("flour", "g").await;
        let milk = t.ingredient("milk", "ml").await;
        let eggs = t.ingredient("eggs", "pcs").await;

        let pancakes = t.recipe(&token, "Pancakes", &[tag], &[(flour, 200), (milk, 300), (eggs, 2)]).await;
        let bread = t.recipe(&token, "Bread", &[tag], &[(flour, 500)]).await;
        // not in the cart
        t.recipe(&token, "Omelette", &[tag], &[(eggs, 3)]).await;
        for id in [pancakes, bread] {
            t.post(&format!("/api/recipes/{}/shopping_cart/", id), Some(&token), json!({})).await;
        }
        token
    }

    #[tokio::test]
    async fn test_download_aggregates_text() {
        let t = setup_test_app().await;
        let token = filled_cart(&t).await;

        let response = t.raw(Method::GET, "/api/recipes/download_shopping_cart/", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"shopping-list.txt\""
        );
        assert!(response.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap().starts_with("text/plain"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert_eq!(
            text,
            "Shopping list for shopper:\n* eggs (pcs) - 2\n* flour (g) - 700\n* milk (ml) - 300\n"
        );

        let (_, metrics) = t.get("/metrics", None).await;
        assert_eq!(metrics["shopping_lists_downloaded"], 1);
    }

    #[tokio::test]
    async fn test_download_csv_and_json() {
        let t = setup_test_app().await;
        let token = filled_cart(&t).await;

        let (status, csv) = t.text("/api/recipes/download_shopping_cart/?format=csv", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(csv.starts_with("Name,Measurement Unit,Amount\n"));
        assert!(csv.contains("\"flour\",\"g\",700"));

        let (status, v) = t.get("/api/recipes/download_shopping_cart/?format=json", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["owner"], "shopper");
        assert_eq!(v["items"][1], json!({"name": "flour", "measurement_unit": "g", "amount": 700}));

        let (status, _) = t.get("/api/recipes/download_shopping_cart/?format=pdf", Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_empty_cart() {
        let t = setup_test_app().await;
        let (_, token) = t.signup("idle").await;
        let (status, text) = t.text("/api/recipes/download_shopping_cart/", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("empty"));
    }

    #[tokio::test]
    async fn test_multiline_names_cannot_forge_list_lines() {
        let t = setup_test_app().await;
        let (id, token) = t.signup("staffer").await;
        t.make_staff(id).await;

        let forged = json!({"name": "flour\n* caviar (kg) - 999", "measurement_unit": "g"});
        let (status, v) = t.post("/api/ingredients/", Some(&token), forged).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"]["details"]["field"], "name");

        let forged_unit = json!({"name": "flour", "measurement_unit": "g\r\n* caviar"});
        let (status, v) = t.post("/api/ingredients/", Some(&token), forged_unit).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"]["details"]["field"], "measurement_unit");

        let (status, v) = t.get("/api/ingredients/?name=flour", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v, json!([]));

        let tag = t.tag("lunch", "#49B64E").await;
        let salt = t.ingredient("salt", "g").await;
        let mut recipe = json!({
            "ingredients": [{"id": salt, "amount": 5}],
            "tags": [tag],
            "name": "Soup\n* caviar (kg) - 999",
            "text": "Boil.\nSalt to taste.",
            "cooking_time": 20,
        });
        let (status, v) = t.post("/api/recipes/", Some(&token), recipe.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"]["details"]["field"], "name");

        // recipe text stays multi-line
        recipe["name"] = json!("Soup");
        let (status, v) = t.post("/api/recipes/", Some(&token), recipe).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["text"], "Boil.\nSalt to taste.");
    }

    #[tokio::test]
    async fn test_download_requires_auth() {
        let t = setup_test_app().await;
        let (status, _) = t.get("/api/recipes/download_shopping_cart/", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deleted_recipe_leaves_cart() {
        let t = setup_test_app().await;
        let token = filled_cart(&t).await;
        sqlx::query("DELETE FROM recipes WHERE name = 'Bread'").execute(&t.state.db).await.unwrap();

        let (_, text) = t.text("/api/recipes/download_shopping_cart/", Some(&token)).await;
        assert!(text.contains("* flour (g) - 200\n"));
    }
}
