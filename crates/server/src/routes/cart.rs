//! Cart route handlers.
//!
//! Every mutation answers with the owner's refreshed cart so the storefront
//! can re-render without a second request. An owner is either a logged-in
//! user (`userId`) or an anonymous session token (`session`); when both are
//! sent the user wins and the session rides along for the pre-adoption
//! merge view.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::instrument;

use partsmith_core::{CartOwner, ProductId, UserId};

use crate::error::{AppError, Result};
use crate::models::CartItem;
use crate::services::CartService;
use crate::state::AppState;

/// Query parameters for `GET /cart`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartQuery {
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub session: Option<String>,
}

/// Body for `POST /cart/plus` and `POST /cart/minus`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartMutation {
    #[serde(default)]
    pub product_id: i32,
    #[serde(default)]
    pub selector_value: Option<String>,
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub session: Option<String>,
}

/// Body for `POST /cart/adopt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoptBody {
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub session: Option<String>,
}

fn resolve_owner(user_id: Option<i32>, session: Option<&str>) -> Result<CartOwner> {
    if let Some(id) = user_id
        && id > 0
    {
        return Ok(CartOwner::User(UserId::new(id)));
    }
    if let Some(token) = session
        && !token.trim().is_empty()
    {
        return Ok(CartOwner::Session(token.trim().to_owned()));
    }
    Err(AppError::BadRequest("Cart owner is required".to_owned()))
}

/// Cart contents for an owner.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Query(query): Query<CartQuery>,
) -> Result<Json<Vec<CartItem>>> {
    let owner = resolve_owner(query.user_id, query.session.as_deref())?;
    let service = CartService::new(state.pool().clone());

    let items = service.fetch(&owner, query.session.as_deref()).await?;
    Ok(Json(items))
}

/// Add one unit of a product to the cart.
#[instrument(skip(state, body))]
pub async fn plus(
    State(state): State<AppState>,
    Json(body): Json<CartMutation>,
) -> Result<Json<Vec<CartItem>>> {
    let owner = resolve_owner(body.user_id, body.session.as_deref())?;
    if body.product_id <= 0 {
        return Err(AppError::BadRequest("Product id is required".to_owned()));
    }

    let service = CartService::new(state.pool().clone());
    let selector = body.selector_value.unwrap_or_default();
    service.add(&owner, ProductId::new(body.product_id), &selector).await?;

    let items = service.fetch(&owner, body.session.as_deref()).await?;
    Ok(Json(items))
}

/// Remove one unit of a product from the cart.
#[instrument(skip(state, body))]
pub async fn minus(
    State(state): State<AppState>,
    Json(body): Json<CartMutation>,
) -> Result<Json<Vec<CartItem>>> {
    let owner = resolve_owner(body.user_id, body.session.as_deref())?;
    if body.product_id <= 0 {
        return Err(AppError::BadRequest("Product id is required".to_owned()));
    }

    let service = CartService::new(state.pool().clone());
    let selector = body.selector_value.unwrap_or_default();
    service.remove(&owner, ProductId::new(body.product_id), &selector).await?;

    let items = service.fetch(&owner, body.session.as_deref()).await?;
    Ok(Json(items))
}

/// Fold an anonymous session's cart into a user's cart at login.
#[instrument(skip(state, body))]
pub async fn adopt(
    State(state): State<AppState>,
    Json(body): Json<AdoptBody>,
) -> Result<Json<Vec<CartItem>>> {
    let user_id = body.user_id.filter(|id| *id > 0);
    let session = body.session.as_deref().map(str::trim).filter(|token| !token.is_empty());
    let (Some(user_id), Some(session)) = (user_id, session) else {
        return Err(AppError::BadRequest("User id and session are required".to_owned()));
    };

    let owner = CartOwner::User(UserId::new(user_id));
    let service = CartService::new(state.pool().clone());
    service.adopt_session(session, &owner).await?;

    let items = service.fetch(&owner, None).await?;
    Ok(Json(items))
}
