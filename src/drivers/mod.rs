pub mod chunking;
pub mod pagination;
pub mod strategy;

pub use chunking::{split_range, ChunkDriver, ChunkReport};
pub use pagination::{
    ListingQuery, Page, PageEvent, PageParser, PaginationReport, Paginator, StopReason,
};
pub use strategy::{ChainMode, Strategy, StrategyChain, StrategyYield};
