use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

// Users & auth

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserDto {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Whether the requesting user follows this user.
    pub is_subscribed: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Response of a registration; never echoes the password.
#[derive(Debug, Serialize)]
pub struct CreatedUserDto {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub new_password: String,
    pub current_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub auth_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorWithRecipesDto {
    #[serde(flatten)]
    pub user: UserDto,
    pub recipes: Vec<RecipeShortDto>,
    pub recipes_count: i64,
}

// Tags & ingredients

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct TagDto {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct IngredientDto {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub measurement_unit: String,
}

// Recipes

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeIngredientDto {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDto {
    pub id: i64,
    pub tags: Vec<TagDto>,
    pub author: Option<UserDto>,
    pub ingredients: Vec<RecipeIngredientDto>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i64,
    pub pub_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeShortDto {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i64,
}

/// An ingredient amount as sent by clients: a JSON number or a digit string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(i64),
    Text(String),
}

impl Amount {
    pub fn value(&self) -> AppResult<i64> {
        let parsed = match self {
            Amount::Number(n) => *n,
            Amount::Text(s) => {
                let s = s.trim();
                if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
                    return Err(AppError::field("ingredients", "Ingredient amount must be a number"));
                }
                s.parse::<i64>()
                    .map_err(|_| AppError::field("ingredients", "Ingredient amount is too large"))?
            }
        };
        if parsed < 1 {
            return Err(AppError::field("ingredients", "Ingredient amount must be at least 1"));
        }
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmountInput {
    pub id: i64,
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub ingredients: Vec<IngredientAmountInput>,
    pub tags: Vec<i64>,
    #[serde(default)]
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRecipeRequest {
    pub ingredients: Option<Vec<IngredientAmountInput>>,
    pub tags: Option<Vec<i64>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}
