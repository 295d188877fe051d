use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Scrape;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Connect, Crawl, Aggregate, Deliver, Stats }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Connect => "connect",
        Phase::Crawl => "crawl",
        Phase::Aggregate => "aggregate",
        Phase::Deliver => "deliver",
        Phase::Stats => "stats",
    }}
    fn span(&self) -> Span { match self {
        Phase::Connect => info_span!("connect"),
        Phase::Crawl => info_span!("crawl"),
        Phase::Aggregate => info_span!("aggregate"),
        Phase::Deliver => info_span!("deliver"),
        Phase::Stats => info_span!("stats"),
    }}
}

impl OpMarker for Scrape {
    const NAME: &'static str = "scrape";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("scrape") }
}
