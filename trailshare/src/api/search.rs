use std::{cmp::Ordering, collections::HashMap};

use axum::{
    Json,
    extract::{Query, State},
};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
    entities::equipment,
    errors::ApiError,
    filtering::search::build_like_condition,
    geo::RadiusQuery,
    resources::equipment::Equipment,
    services::{Candidate, KeywordScorer, query_terms},
    state::AppState,
};

/// Most listings handed to the scorer per query
const CANDIDATE_CAP: u64 = 50;
const DEFAULT_LIMIT: usize = 20;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(search))
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Free-text query
    pub q: Option<String>,
    pub category: Option<String>,
    /// Lowest daily price in cents
    pub min_price: Option<i64>,
    /// Highest daily price in cents
    pub max_price: Option<i64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    /// Results to return (1 to 50, default 20)
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResult {
    #[serde(flatten)]
    pub equipment: Equipment,
    /// Relevance from 0 to 100
    pub score: u8,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResponse {
    pub query: String,
    /// `llm` or `keyword`
    pub scorer: &'static str,
    pub results: Vec<SearchResult>,
}

/// Score desc, then nearest, then newest
fn rank(a: &SearchResult, b: &SearchResult) -> Ordering {
    let distance = |r: &SearchResult| r.distance_km.unwrap_or(f64::INFINITY);
    b.score
        .cmp(&a.score)
        .then_with(|| distance(a).total_cmp(&distance(b)))
        .then_with(|| b.equipment.created_at.cmp(&a.equipment.created_at))
}

fn structured_filters(query: &SearchQuery, radius: Option<&RadiusQuery>) -> Condition {
    let mut condition = Condition::all().add(equipment::Column::IsAvailable.eq(true));
    if let Some(category) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        condition = condition.add(equipment::Column::Category.eq(category.to_lowercase()));
    }
    if let Some(min) = query.min_price {
        condition = condition.add(equipment::Column::PricePerDayCents.gte(min));
    }
    if let Some(max) = query.max_price {
        condition = condition.add(equipment::Column::PricePerDayCents.lte(max));
    }
    if let Some(radius) = radius {
        let bbox = radius.bounding_box();
        condition = condition
            .add(equipment::Column::Latitude.between(bbox.min_lat, bbox.max_lat))
            .add(equipment::Column::Longitude.between(bbox.min_lng, bbox.max_lng));
    }
    condition
}

/// Any query term in title, description or category
fn keyword_prefilter(terms: &[String]) -> Condition {
    terms.iter().fold(Condition::any(), |acc, term| {
        acc.add(build_like_condition(equipment::Column::Title, term))
            .add(build_like_condition(equipment::Column::Description, term))
            .add(build_like_condition(equipment::Column::Category, term))
    })
}

async fn find_candidates(
    state: &AppState,
    filters: Condition,
    terms: &[String],
) -> Result<Vec<equipment::Model>, ApiError> {
    let select = || {
        equipment::Entity::find()
            .filter(filters.clone())
            .order_by_desc(equipment::Column::CreatedAt)
            .limit(CANDIDATE_CAP)
    };
    let matching = select()
        .filter(keyword_prefilter(terms))
        .all(&state.db)
        .await?;
    if !matching.is_empty() {
        return Ok(matching);
    }
    debug!("No keyword matches, scoring all filtered listings");
    Ok(select().all(&state.db).await?)
}

#[utoipa::path(
    get,
    path = "/search",
    tag = "search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Available listings ranked by relevance", body = SearchResponse),
        (status = 400, description = "Empty query"),
    ),
    summary = "Search listings",
    description = "Ranks up to 50 candidate listings against the query with the configured relevance scorer. The language model scorer falls back to keyword scoring when it fails. With `lat`, `lng` and `radius_km` only listings within the radius are returned."
)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let text = query.q.as_deref().map(str::trim).unwrap_or_default().to_string();
    if text.is_empty() {
        return Err(ApiError::bad_request("Search query `q` must not be empty"));
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 50);
    let radius = RadiusQuery::from_parts(query.lat, query.lng, query.radius_km);
    let terms = query_terms(&text);

    let mut listings = find_candidates(&state, structured_filters(&query, radius.as_ref()), &terms).await?;

    let origin = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => Some((lat, lng)),
        _ => None,
    };
    let distances: HashMap<Uuid, f64> = listings
        .iter()
        .filter_map(|listing| {
            let (lat, lng) = origin?;
            let (to_lat, to_lng) = (listing.latitude?, listing.longitude?);
            Some((listing.id, crate::geo::haversine_km(lat, lng, to_lat, to_lng)))
        })
        .collect();
    if let Some(radius) = &radius {
        listings.retain(|listing| {
            distances
                .get(&listing.id)
                .is_some_and(|distance| *distance <= radius.radius_km)
        });
    }

    let candidates: Vec<Candidate> = listings
        .iter()
        .map(|listing| Candidate {
            id: listing.id,
            title: listing.title.clone(),
            category: listing.category.clone(),
            description: listing.description.clone(),
            price_per_day_cents: listing.price_per_day_cents,
        })
        .collect();

    let (scorer, scores) = if candidates.is_empty() {
        (state.scorer.name(), HashMap::new())
    } else {
        match state.scorer.score(&text, &candidates).await {
            Ok(scores) => (state.scorer.name(), scores),
            Err(e) => {
                warn!(error = %e, scorer = state.scorer.name(), "Relevance scoring failed, using keyword scores");
                ("keyword", KeywordScorer::score_all(&text, &candidates))
            }
        }
    };

    let mut results: Vec<SearchResult> = listings
        .into_iter()
        .map(|listing| SearchResult {
            score: scores.get(&listing.id).copied().unwrap_or(0),
            distance_km: distances.get(&listing.id).copied(),
            equipment: listing.into(),
        })
        .collect();
    results.sort_by(rank);
    results.truncate(limit);

    Ok(Json(SearchResponse {
        query: text,
        scorer,
        results,
    }))
}
