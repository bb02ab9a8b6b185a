// SPDX-License-Identifier: BSD-3-Clause
use std::time::{Duration, Instant};

use tracing::{Id, Subscriber};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

/// Time spent inside a span, summed over its entries.
struct Busy {
    entered: Option<Instant>,
    total: Duration,
}

/// Prints the time spent in each span to stderr when the span closes.
#[derive(Debug, Default)]
pub struct NanoCountLayer;

impl<S> Layer<S> for NanoCountLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut ext = span.extensions_mut();
            match ext.get_mut::<Busy>() {
                Some(busy) => busy.entered = Some(Instant::now()),
                None => ext.insert(Busy {
                    entered: Some(Instant::now()),
                    total: Duration::ZERO,
                }),
            }
        }
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(busy) = span.extensions_mut().get_mut::<Busy>() {
                if let Some(entered) = busy.entered.take() {
                    busy.total += entered.elapsed();
                }
            }
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(&id) {
            if let Some(busy) = span.extensions().get::<Busy>() {
                eprintln!("{}: {}", span.name(), busy.total.as_nanos());
            }
        }
    }
}
