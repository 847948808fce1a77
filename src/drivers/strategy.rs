use crate::data_model::Record;
use crate::error::{Result, ScraperError};
use crate::storage::Collector;
use crate::utils::shutdown::Shutdown;
use async_trait::async_trait;
use tracing::{error, info, warn};

/// One way of producing records (a sort order, a chunked search, a site...).
#[async_trait]
pub trait Strategy<R: Record>: Send + Sync {
    fn name(&self) -> String;

    async fn run(&self, collector: &mut Collector<R>) -> Result<StrategyYield>;
}

/// What one strategy run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrategyYield {
    /// Records read from the source, including ones the collector already held.
    pub found: usize,
    /// Records newly added to the collector.
    pub accepted: usize,
}

impl std::ops::AddAssign for StrategyYield {
    fn add_assign(&mut self, other: Self) {
        self.found += other.found;
        self.accepted += other.accepted;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// Run every strategy and accumulate.
    All,
    /// Stop at the first strategy that finds anything, even if every record
    /// it found was already collected.
    FirstNonEmpty,
}

/// Ordered strategy list. A failing strategy counts as zero and never stops its siblings.
pub struct StrategyChain<R: Record> {
    strategies: Vec<Box<dyn Strategy<R>>>,
    mode: ChainMode,
}

impl<R: Record> StrategyChain<R> {
    pub fn new(mode: ChainMode, strategies: Vec<Box<dyn Strategy<R>>>) -> Self {
        if strategies.is_empty() {
            warn!("Strategy chain created with no strategies.");
        }
        StrategyChain { strategies, mode }
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Returns `(strategy name, accepted)` for every strategy that ran.
    pub async fn run(
        &self,
        collector: &mut Collector<R>,
        shutdown: &Shutdown,
    ) -> Vec<(String, usize)> {
        let mut counts = Vec::with_capacity(self.strategies.len());
        for (index, strategy) in self.strategies.iter().enumerate() {
            if shutdown.is_triggered() {
                warn!(strategy = %strategy.name(), "Shutdown requested, skipping remaining strategies");
                break;
            }
            info!(strategy = %strategy.name(), "Starting strategy");
            let produced = match strategy.run(collector).await {
                Ok(produced) => produced,
                Err(e) => {
                    let e = ScraperError::StrategyError {
                        strategy: strategy.name(),
                        source: Box::new(e),
                    };
                    error!(error = %e, "Strategy failed, counting it as empty");
                    StrategyYield::default()
                }
            };
            info!(
                strategy = %strategy.name(),
                found = produced.found,
                accepted = produced.accepted,
                "Strategy finished"
            );
            counts.push((strategy.name(), produced.accepted));

            if self.mode == ChainMode::FirstNonEmpty {
                if produced.found > 0 {
                    info!(strategy = %strategy.name(), "Strategy successful, skipping fallbacks");
                    break;
                }
                if index + 1 < self.strategies.len() {
                    warn!(strategy = %strategy.name(), "Strategy yielded nothing, falling back");
                }
            }
        }
        counts
    }
}
