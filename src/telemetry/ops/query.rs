use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Query;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Connect, FetchRows, Output }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Connect => "connect",
        Phase::FetchRows => "fetch_rows",
        Phase::Output => "output",
    }}
    fn span(&self) -> Span { match self {
        Phase::Connect => info_span!("connect"),
        Phase::FetchRows => info_span!("fetch_rows"),
        Phase::Output => info_span!("output"),
    }}
}

impl OpMarker for Query {
    const NAME: &'static str = "query";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("query") }
}
