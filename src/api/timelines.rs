//! Timeline endpoints

use axum::{
    extract::{Query, State},
    response::Json,
};

use crate::AppState;
use crate::auth::MaybeViewer;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::FeedService;

use super::dto::{PaginationParams, PostResponse};

/// GET /api/v1/timelines/feed
///
/// Every post the viewer may see, newest first. The visibility
/// predicate runs per post at read time; anonymous viewers see only
/// public posts.
pub async fn feed(
    State(state): State<AppState>,
    viewer: MaybeViewer,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/timelines/feed"])
        .start_timer();

    let service = FeedService::new(state.db.clone());
    let limit = params.limit.or(Some(state.config.limits.default_page_size));
    let posts = service
        .feed(viewer.id(), limit, params.max_id.as_deref())
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/timelines/feed", "200"])
        .inc();
    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}
