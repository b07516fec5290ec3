#![forbid(unsafe_code)]

pub mod app_services;
pub mod card_service;
pub mod chapter_service;
pub mod deck_service;
pub mod distribution_service;
pub mod error;
pub mod progress_service;

pub use deck_core::Clock;

pub use app_services::AppServices;
pub use card_service::CardService;
pub use chapter_service::ChapterService;
pub use deck_service::DeckService;
pub use distribution_service::DistributionService;
pub use error::{
    AppServicesError, CardServiceError, ChapterServiceError, DeckServiceError, DistributionError,
    ProgressError,
};
pub use progress_service::{ChapterProgressMap, ProgressService};
