#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::tests::common::setup_test_app;

    #[tokio::test]
    async fn test_favorite_toggle() {
        let t = setup_test_app().await;
        let (_, token) = t.signup("chef").await;
        let tag = t.tag("lunch", "#49B64E").await;
        let flour = t.ingredient("flour", "g").await;
        let id = t.recipe(&token, "Bread", &[tag], &[(flour, 500)]).await;
        let uri = format!("/api/recipes/{}/favorite/", id);

        let (status, v) = t.post(&uri, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v, json!({"id": id, "name": "Bread", "image": null, "cooking_time": 15}));

        let (status, _) = t.post(&uri, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, v) = t.get(&format!("/api/recipes/{}/", id), Some(&token)).await;
        assert_eq!(v["is_favorited"], true);

        let (status, _) = t.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = t.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_toggle_unknown_recipe_and_anonymous() {
        let t = setup_test_app().await;
        let (_, token) = t.signup("chef").await;

        let (status, _) = t.post("/api/recipes/9999/favorite/", Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = t.delete("/api/recipes/9999/shopping_cart/", Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = t.post("/api/recipes/1/shopping_cart/", None, json!({})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cart_toggle_is_per_user() {
        let t = setup_test_app().await;
        let (_, alice) = t.signup("alice").await;
        let (_, bob) = t.signup("bob").await;
        let tag = t.tag("lunch", "#49B64E").await;
        let flour = t.ingredient("flour", "g").await;
        let id = t.recipe(&alice, "Bread", &[tag], &[(flour, 500)]).await;
        let uri = format!("/api/recipes/{}/shopping_cart/", id);

        let (status, _) = t.post(&uri, Some(&alice), json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = t.post(&uri, Some(&bob), json!({})).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, v) = t.get(&format!("/api/recipes/{}/", id), Some(&bob)).await;
        assert_eq!(v["is_in_shopping_cart"], true);
        assert_eq!(v["is_favorited"], false);

        let (status, _) = t.delete(&uri, Some(&alice)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, v) = t.get(&format!("/api/recipes/{}/", id), Some(&bob)).await;
        assert_eq!(v["is_in_shopping_cart"], true);
    }

    #[tokio::test]
    async fn test_subscribe_rules() {
        let t = setup_test_app().await;
        let (me, token) = t.signup("reader").await;
        let (author, _) = t.signup("author").await;
        let uri = format!("/api/users/{}/subscribe/", author);

        let (status, _) = t.post(&format!("/api/users/{}/subscribe/", me), Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, v) = t.post(&uri, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["id"], author);
        assert_eq!(v["is_subscribed"], true);
        assert_eq!(v["recipes_count"], 0);

        let (status, _) = t.post(&uri, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, v) = t.get(&format!("/api/users/{}/", author), Some(&token)).await;
        assert_eq!(v["is_subscribed"], true);
        let (_, v) = t.get(&format!("/api/users/{}/", author), None).await;
        assert_eq!(v["is_subscribed"], false);

        let (status, _) = t.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = t.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = t.post("/api/users/9999/subscribe/", Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_subscriptions_list_with_recipes_limit() {
        let t = setup_test_app().await;
        let (_, reader) = t.signup("reader").await;
        let (author, author_token) = t.signup("author").await;
        let tag = t.tag("lunch", "#49B64E").await;
        let flour = t.ingredient("flour", "g").await;
        for name in ["One", "Two", "Three", "Four"] {
            t.recipe(&author_token, name, &[tag], &[(flour, 1)]).await;
        }
        t.post(&format!("/api/users/{}/subscribe/", author), Some(&reader), json!({})).await;

        let (status, v) = t.get("/api/users/subscriptions/", Some(&reader)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["count"], 1);
        let entry = &v["results"][0];
        assert_eq!(entry["username"], "author");
        assert_eq!(entry["recipes_count"], 4);
        // default limit from config
        assert_eq!(entry["recipes"].as_array().unwrap().len(), 3);
        assert_eq!(entry["recipes"][0]["name"], "Four");

        let (_, v) = t.get("/api/users/subscriptions/?recipes_limit=1", Some(&reader)).await;
        assert_eq!(v["results"][0]["recipes"].as_array().unwrap().len(), 1);

        let (status, _) = t.get("/api/users/subscriptions/", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
