use std::sync::Arc;

use crate::application::forum::ForumService;
use crate::application::repos::JobsRepo;
use crate::application::similarity::SimilarityService;
use crate::application::tags::TagService;
use crate::application::trending::TrendingService;
use crate::application::views::ViewBuffer;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct ApiState {
    pub views: Arc<ViewBuffer>,
    pub trending: Arc<TrendingService>,
    pub similarity: Arc<SimilarityService>,
    pub tags: Arc<TagService>,
    pub forum: Arc<ForumService>,
    pub jobs: Arc<dyn JobsRepo>,
    /// `None` when running on in-memory repositories.
    pub db: Option<Arc<PostgresRepositories>>,
}
