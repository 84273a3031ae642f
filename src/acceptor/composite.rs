//! Composite acceptors (C2): sequencing, repetition, and delimiter framing.
use super::{Acceptor, Stepper};
use crate::value::StepperValue;
use std::sync::Arc;

/// Accepts each sub-acceptor in sequence. A stepper midway through element
/// `idx` holds a live sub-stepper for it; once that sub-stepper reaches an
/// accept state, the chain may *commit* (advance to `idx + 1`) on the same
/// character it also tries to *continue* feeding to the current element, so
/// both futures stay live until one dies (spec.md §4.2's dual branching).
#[derive(Debug, Clone)]
pub struct Chain {
    pub items: Vec<Arc<Acceptor>>,
}

impl Chain {
    pub fn new(items: Vec<Arc<Acceptor>>) -> Self {
        Self { items }
    }
}

#[derive(Debug, Clone)]
pub struct ChainStepper {
    pub acceptor: Chain,
    pub idx: usize,
    pub current: Vec<Stepper>,
    pub history: Vec<StepperValue>,
}

impl ChainStepper {
    pub fn new(acceptor: Chain) -> Self {
        let current = if acceptor.items.is_empty() {
            vec![]
        } else {
            acceptor.items[0].initial_steppers()
        };
        Self {
            acceptor,
            idx: 0,
            current,
            history: Vec::new(),
        }
    }

    fn at_end(&self) -> bool {
        self.idx >= self.acceptor.items.len()
    }

    fn advance_from(
        acceptor: &Chain,
        idx: usize,
        history: &[StepperValue],
        current: Vec<Stepper>,
    ) -> ChainStepper {
        ChainStepper {
            acceptor: acceptor.clone(),
            idx,
            current,
            history: history.to_vec(),
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<ChainStepper> {
        if self.at_end() {
            return vec![];
        }
        let mut out = Vec::new();
        for sub in &self.current {
            let continuations = sub.consume_char(ch);
            for cont in continuations {
                out.push(ChainStepper {
                    acceptor: self.acceptor.clone(),
                    idx: self.idx,
                    current: vec![cont],
                    history: self.history.clone(),
                });
            }
            if sub.has_reached_accept_state() {
                let mut history = self.history.clone();
                history.push(sub.current_value());
                let next_idx = self.idx + 1;
                if next_idx >= self.acceptor.items.len() {
                    continue;
                }
                let fresh_next = self.acceptor.items[next_idx].initial_steppers();
                for next_stepper in fresh_next {
                    for advanced in next_stepper.consume_char(ch) {
                        out.push(Self::advance_from(
                            &self.acceptor,
                            next_idx,
                            &history,
                            vec![advanced],
                        ));
                    }
                }
            }
        }
        out
    }

    pub fn has_reached_accept_state(&self) -> bool {
        if self.acceptor.items.is_empty() {
            return true;
        }
        self.idx + 1 == self.acceptor.items.len()
            && self.current.iter().any(|s| s.has_reached_accept_state())
    }

    pub fn can_accept_more_input(&self) -> bool {
        if self.at_end() {
            return false;
        }
        self.current.iter().any(|s| s.can_accept_more_input())
            || self.idx + 1 < self.acceptor.items.len()
    }

    pub fn current_value(&self) -> StepperValue {
        let mut text = String::new();
        for v in &self.history {
            if let StepperValue::Text(s) = v {
                text.push_str(s);
            } else if let Some(s) = v.as_text() {
                text.push_str(s);
            }
        }
        for s in &self.current {
            text.push_str(&s.raw_text());
        }
        StepperValue::Text(text)
    }

    /// The accumulated values of every completed element, in order; used by
    /// [`Encapsulated`] to pull out its inner element's final value.
    pub fn history(&self) -> &[StepperValue] {
        &self.history
    }

    /// The live sub-stepper for the current element, if any.
    pub fn current_sub(&self) -> Option<&Stepper> {
        self.current.first()
    }
}

/// Repeats an inner acceptor between `min_count` and `max_count` times,
/// separated by an optional separator acceptor.
#[derive(Debug, Clone)]
pub struct Loop {
    pub item: Arc<Acceptor>,
    pub separator: Option<Arc<Acceptor>>,
    pub min_count: usize,
    pub max_count: usize,
    /// Whether separator characters are folded into `current_value()`'s
    /// reconstructed text, or swallowed so only item text shows through.
    pub track_separator: bool,
}

impl Loop {
    pub fn new(item: Arc<Acceptor>, min_count: usize, max_count: usize) -> Self {
        Self {
            item,
            separator: None,
            min_count,
            max_count,
            track_separator: true,
        }
    }

    pub fn with_separator(mut self, separator: Arc<Acceptor>) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn with_track_separator(mut self, track_separator: bool) -> Self {
        self.track_separator = track_separator;
        self
    }
}

#[derive(Debug, Clone)]
enum LoopPhase {
    Item,
    Separator,
}

#[derive(Debug, Clone)]
pub struct LoopStepper {
    pub acceptor: Loop,
    phase: LoopPhase,
    loop_count: usize,
    current: Vec<Stepper>,
    text: String,
}

impl LoopStepper {
    pub fn new(acceptor: Loop) -> Self {
        let current = acceptor.item.initial_steppers();
        Self {
            acceptor,
            phase: LoopPhase::Item,
            loop_count: 0,
            current,
            text: String::new(),
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<LoopStepper> {
        let mut out = Vec::new();
        let in_separator = matches!(self.phase, LoopPhase::Separator);
        for sub in &self.current {
            for cont in sub.consume_char(ch) {
                let mut text = self.text.clone();
                if !in_separator || self.acceptor.track_separator {
                    text.push(ch);
                }
                out.push(LoopStepper {
                    acceptor: self.acceptor.clone(),
                    phase: self.phase.clone(),
                    loop_count: self.loop_count,
                    current: vec![cont],
                    text,
                });
            }
            if sub.has_reached_accept_state() {
                match self.phase {
                    LoopPhase::Item => {
                        let loop_count = self.loop_count + 1;
                        if let Some(sep) = &self.acceptor.separator {
                            if loop_count < self.acceptor.max_count {
                                for sep_stepper in sep.initial_steppers() {
                                    for advanced in sep_stepper.consume_char(ch) {
                                        let mut text = self.text.clone();
                                        if self.acceptor.track_separator {
                                            text.push(ch);
                                        }
                                        out.push(LoopStepper {
                                            acceptor: self.acceptor.clone(),
                                            phase: LoopPhase::Separator,
                                            loop_count,
                                            current: vec![advanced],
                                            text,
                                        });
                                    }
                                }
                            }
                        } else if loop_count < self.acceptor.max_count {
                            for item_stepper in self.acceptor.item.initial_steppers() {
                                for advanced in item_stepper.consume_char(ch) {
                                    let mut text = self.text.clone();
                                    text.push(ch);
                                    out.push(LoopStepper {
                                        acceptor: self.acceptor.clone(),
                                        phase: LoopPhase::Item,
                                        loop_count,
                                        current: vec![advanced],
                                        text,
                                    });
                                }
                            }
                        }
                    }
                    LoopPhase::Separator => {
                        for item_stepper in self.acceptor.item.initial_steppers() {
                            for advanced in item_stepper.consume_char(ch) {
                                let mut text = self.text.clone();
                                text.push(ch);
                                out.push(LoopStepper {
                                    acceptor: self.acceptor.clone(),
                                    phase: LoopPhase::Item,
                                    loop_count: self.loop_count,
                                    current: vec![advanced],
                                    text,
                                });
                            }
                        }
                    }
                }
            }
        }
        out
    }

    pub fn has_reached_accept_state(&self) -> bool {
        match self.phase {
            LoopPhase::Item => {
                let completed_now = self.current.iter().any(|s| s.has_reached_accept_state())
                    && self.loop_count + 1 >= self.acceptor.min_count;
                let already_done =
                    self.loop_count >= self.acceptor.min_count && self.current.is_empty();
                completed_now || already_done
            }
            LoopPhase::Separator => false,
        }
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.loop_count < self.acceptor.max_count
            && self.current.iter().any(|s| s.can_accept_more_input())
    }

    pub fn current_value(&self) -> StepperValue {
        StepperValue::Text(self.text.clone())
    }
}

/// Buffers free text until a wrapped `target` acceptor's opening matches,
/// at which point control transfers to it. Used to implement scratchpads:
/// arbitrary prose preceding a fenced or schema-governed block.
#[derive(Debug, Clone)]
pub struct WaitFor {
    pub target: Arc<Acceptor>,
    /// Minimum number of buffered characters before the target may start
    /// (see [`crate::config::EngineOptions::buffer_length`]).
    pub buffer_length: usize,
    /// Whether the buffer may still accept characters once the target has
    /// started matching (lets target-start be speculative without losing
    /// the buffer-only continuation).
    pub allow_break: bool,
}

impl WaitFor {
    pub fn new(target: Arc<Acceptor>) -> Self {
        Self {
            target,
            buffer_length: 0,
            allow_break: true,
        }
    }

    pub fn with_buffer_length(mut self, n: usize) -> Self {
        self.buffer_length = n;
        self
    }
}

#[derive(Debug, Clone)]
pub struct WaitForStepper {
    pub acceptor: WaitFor,
    pub buffer: String,
    pub target: Option<Vec<Stepper>>,
}

impl WaitForStepper {
    pub fn new(acceptor: WaitFor) -> Self {
        Self {
            acceptor,
            buffer: String::new(),
            target: None,
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<WaitForStepper> {
        let mut out = Vec::new();
        let long_enough = self.buffer.chars().count() >= self.acceptor.buffer_length;

        if long_enough {
            let starts: Vec<Stepper> = self
                .target
                .clone()
                .unwrap_or_else(|| self.acceptor.target.initial_steppers());
            for sub in &starts {
                for advanced in sub.consume_char(ch) {
                    out.push(WaitForStepper {
                        acceptor: self.acceptor.clone(),
                        buffer: self.buffer.clone(),
                        target: Some(vec![advanced]),
                    });
                }
            }
        }

        if self.target.is_none() || self.acceptor.allow_break {
            let mut buffer = self.buffer.clone();
            buffer.push(ch);
            out.push(WaitForStepper {
                acceptor: self.acceptor.clone(),
                buffer,
                target: None,
            });
        }
        out
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|steppers| steppers.iter().any(|s| s.has_reached_accept_state()))
    }

    pub fn can_accept_more_input(&self) -> bool {
        true
    }

    pub fn current_value(&self) -> StepperValue {
        match &self.target {
            Some(steppers) => steppers
                .first()
                .map(|s| s.current_value())
                .unwrap_or(StepperValue::None),
            None => StepperValue::Text(self.buffer.clone()),
        }
    }

    /// The live target sub-stepper, once the target has started matching.
    pub fn target_stepper(&self) -> Option<&Stepper> {
        self.target.as_ref().and_then(|v| v.first())
    }

    /// True once this stepper has committed to matching the target (even
    /// partially) rather than still only buffering.
    pub fn is_within_target(&self) -> bool {
        self.target.is_some()
    }
}

/// A fenced block: `open` delimiter, then `inner`, then `close` delimiter,
/// modelled as a three-element [`Chain`] whose first element is a
/// [`WaitFor`] wrapping the open phrase (so arbitrary prose may precede the
/// fence) — this is the same composition the encapsulation logic it's
/// grounded on uses.
#[derive(Debug, Clone)]
pub struct Encapsulated {
    pub chain: Chain,
}

impl Encapsulated {
    pub fn new(inner: Arc<Acceptor>, open: &str, close: &str, buffer_length: usize) -> Self {
        let open_acceptor = Arc::new(Acceptor::Phrase(super::Phrase::new(open)));
        let close_acceptor = Arc::new(Acceptor::Phrase(super::Phrase::new(close)));
        let wait = Arc::new(Acceptor::WaitFor(
            WaitFor::new(open_acceptor).with_buffer_length(buffer_length),
        ));
        Self {
            chain: Chain::new(vec![wait, inner, close_acceptor]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncapsulatedStepper {
    pub acceptor: Encapsulated,
    pub inner: ChainStepper,
}

impl EncapsulatedStepper {
    pub fn new(acceptor: Encapsulated) -> Self {
        let inner = ChainStepper::new(acceptor.chain.clone());
        Self { acceptor, inner }
    }

    pub fn consume_char(&self, ch: char) -> Vec<EncapsulatedStepper> {
        self.inner
            .consume_char(ch)
            .into_iter()
            .map(|inner| EncapsulatedStepper {
                acceptor: self.acceptor.clone(),
                inner,
            })
            .collect()
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.inner.has_reached_accept_state()
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.inner.can_accept_more_input()
    }

    /// True once the stepper has moved past the opening delimiter, i.e. is
    /// inside the inner acceptor or past it — used by callers (e.g. the
    /// engine's scratchpad bookkeeping) to tell buffering from structured
    /// content.
    pub fn is_within_value(&self) -> bool {
        self.inner.idx >= 1
    }

    pub fn current_value(&self) -> StepperValue {
        self.inner
            .history()
            .get(1)
            .cloned()
            .or_else(|| self.inner.current_sub().map(|s| s.current_value()))
            .unwrap_or(StepperValue::None)
    }

    /// Strip any partially-matched leading/trailing delimiter fragment from
    /// the raw buffered text, so callers only see genuine scratchpad or
    /// inner-value content — never a half-typed fence.
    pub fn token_safe_output(&self) -> String {
        self.inner.current_value().as_text().map_or_else(
            || String::new(),
            |s| s.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::primitive::Phrase;
    use crate::acceptor::{advance_all_basic, Acceptor};

    fn phrase(s: &str) -> Arc<Acceptor> {
        Arc::new(Acceptor::Phrase(Phrase::new(s)))
    }

    #[test]
    fn chain_matches_concatenation() {
        let chain = Arc::new(Acceptor::Chain(Chain::new(vec![phrase("ab"), phrase("cd")])));
        let steppers = chain.initial_steppers();
        let result = advance_all_basic(&steppers, "abcd");
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn loop_respects_max_count() {
        let item = phrase("x");
        let loop_acceptor = Arc::new(Acceptor::Loop(Loop::new(item, 1, 2)));
        let steppers = loop_acceptor.initial_steppers();
        let result = advance_all_basic(&steppers, "xx");
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
        let overrun = advance_all_basic(&loop_acceptor.initial_steppers(), "xxx");
        assert!(!overrun.iter().any(|s| s.has_reached_accept_state()
            && !s.can_accept_more_input()
            && s.raw_text() == "xxx"));
    }

    #[test]
    fn wait_for_buffers_until_target_matches() {
        let target = phrase("START");
        let wait = Arc::new(Acceptor::WaitFor(WaitFor::new(target)));
        let steppers = wait.initial_steppers();
        let result = advance_all_basic(&steppers, "blah blah START");
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn encapsulated_strips_delimiters() {
        let inner = phrase("42");
        let enc = Arc::new(Acceptor::Encapsulated(Encapsulated::new(inner, "<<", ">>", 0)));
        let steppers = enc.initial_steppers();
        let result = advance_all_basic(&steppers, "<<42>>");
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
    }
}
