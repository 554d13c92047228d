//! Serves recorded outputs back in order.

use std::collections::{HashMap, VecDeque};

use super::Cassette;

/// Hands out recorded outputs per `(port, method)` in the order they were recorded.
#[derive(Debug, Default)]
pub struct CassetteReplayer {
    queues: HashMap<(String, String), VecDeque<serde_json::Value>>,
}

impl CassetteReplayer {
    /// Index a loaded cassette.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        let mut interactions = cassette.interactions.clone();
        interactions.sort_by_key(|i| i.seq);

        let mut queues: HashMap<(String, String), VecDeque<serde_json::Value>> = HashMap::new();
        for interaction in interactions {
            queues
                .entry((interaction.port, interaction.method))
                .or_default()
                .push_back(interaction.output);
        }
        Self { queues }
    }

    /// Take the next output recorded for `port`/`method`.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch when the cassette has nothing
    /// (left) for this call.
    pub fn next_output(&mut self, port: &str, method: &str) -> Result<serde_json::Value, String> {
        let key = (port.to_string(), method.to_string());
        match self.queues.get_mut(&key) {
            Some(queue) => queue.pop_front().ok_or_else(|| {
                format!("cassette exhausted: every {port}::{method} interaction was already used")
            }),
            None => {
                let mut available: Vec<String> =
                    self.queues.keys().map(|(p, m)| format!("{p}::{m}")).collect();
                available.sort();
                Err(format!(
                    "cassette has no {port}::{method} interactions (available: [{}])",
                    available.join(", ")
                ))
            }
        }
    }

    #[cfg(test)]
    fn remaining(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::cassette::Interaction;

    fn interaction(seq: u64, port: &str, output: serde_json::Value) -> Interaction {
        Interaction { seq, port: port.into(), method: "call".into(), input: json!({}), output }
    }

    fn cassette(interactions: Vec<Interaction>) -> Cassette {
        Cassette { name: "test".into(), recorded_at: Utc::now(), interactions }
    }

    #[test]
    fn replays_in_sequence_order_per_port() {
        let mut replayer = CassetteReplayer::new(&cassette(vec![
            interaction(2, "a", json!(3)),
            interaction(0, "a", json!(1)),
            interaction(1, "b", json!(2)),
        ]));
        assert_eq!(replayer.remaining(), 3);
        assert_eq!(replayer.next_output("a", "call").unwrap(), json!(1));
        assert_eq!(replayer.next_output("b", "call").unwrap(), json!(2));
        assert_eq!(replayer.next_output("a", "call").unwrap(), json!(3));
        assert_eq!(replayer.remaining(), 0);
    }

    #[test]
    fn exhausted_port_is_an_error() {
        let mut replayer = CassetteReplayer::new(&cassette(vec![interaction(0, "a", json!(1))]));
        replayer.next_output("a", "call").unwrap();
        let err = replayer.next_output("a", "call").unwrap_err();
        assert!(err.contains("exhausted"), "{err}");
    }

    #[test]
    fn unknown_port_lists_available() {
        let mut replayer = CassetteReplayer::new(&cassette(vec![interaction(0, "a", json!(1))]));
        let err = replayer.next_output("z", "call").unwrap_err();
        assert!(err.contains("a::call"), "{err}");
    }
}
