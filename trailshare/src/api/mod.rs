//! HTTP handlers, one module per area. Every handler carries a
//! `#[utoipa::path]` with its full path so the routers merge flat.

pub mod admin;
pub mod auth;
pub mod blog;
pub mod bookings;
pub mod equipment;
pub mod health;
pub mod images;
pub mod me;
pub mod profiles;
pub mod search;

use utoipa::{
    Modify, OpenApi,
    openapi::{
        Components,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_axum::router::OpenApiRouter;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trailshare API",
        description = "Peer-to-peer outdoor gear rentals: listings, images, bookings, favorites, search and a small blog.",
        version = "0.3.0"
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Service status"),
        (name = "auth", description = "Accounts and tokens"),
        (name = "equipment", description = "Gear listings"),
        (name = "images", description = "Listing photos"),
        (name = "bookings", description = "Rental requests and their lifecycle"),
        (name = "me", description = "The signed-in user's lists and profile"),
        (name = "search", description = "Relevance-ranked search"),
        (name = "profiles", description = "Public user profiles"),
        (name = "blog", description = "Guides and news"),
        (name = "admin", description = "Moderation and statistics")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT scheme referenced by `security(("bearer" = []))`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.components.get_or_insert_with(Components::new).add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// All API routes with their OpenAPI description
pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(health::router())
        .merge(auth::router())
        .merge(equipment::router())
        .merge(images::router())
        .merge(bookings::router())
        .merge(me::router())
        .merge(search::router())
        .merge(profiles::router())
        .merge(blog::router())
        .merge(admin::router())
}
