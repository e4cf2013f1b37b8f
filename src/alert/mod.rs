//! PW-018: Alert sinks. What happens once a run has breached.
//!
//! The monitor calls `on_breach` at most once per run and only when the
//! aggregate verdict failed. What a sink does (revoke sessions, page an
//! operator, write an audit line) is its own business.

pub mod command;

use crate::core::types::{BreachReasons, ProvenanceEvent};
use crate::tripwire::eventlog;
use std::path::PathBuf;
use tracing::{error, info};

/// Payload handed to every sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breach {
    pub run_id: String,
    pub reasons: BreachReasons,
    pub findings: usize,
}

/// External reaction to a breached run.
pub trait AlertSink {
    fn name(&self) -> &str;

    fn on_breach(&self, breach: &Breach) -> Result<(), String>;
}

/// Prints the breach banner to stdout.
#[derive(Debug, Default)]
pub struct ConsoleAlert;

impl AlertSink for ConsoleAlert {
    fn name(&self) -> &str {
        "console"
    }

    fn on_breach(&self, breach: &Breach) -> Result<(), String> {
        println!();
        println!(
            "*** SECURITY ALERT ({}): potential breach detected, invalidating session. ***",
            breach.reasons
        );
        Ok(())
    }
}

/// Appends a `breach_detected` event to a JSONL log.
#[derive(Debug)]
pub struct EventLogAlert {
    pub path: PathBuf,
}

impl AlertSink for EventLogAlert {
    fn name(&self) -> &str {
        "event-log"
    }

    fn on_breach(&self, breach: &Breach) -> Result<(), String> {
        eventlog::append_event(
            &self.path,
            ProvenanceEvent::BreachDetected {
                run_id: breach.run_id.clone(),
                reasons: breach.reasons,
                findings: breach.findings,
            },
        )
    }
}

/// Dispatches to every inner sink; one failing sink does not stop the rest.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AlertSink for FanOut {
    fn name(&self) -> &str {
        "fan-out"
    }

    fn on_breach(&self, breach: &Breach) -> Result<(), String> {
        let mut failed = Vec::new();
        for sink in &self.sinks {
            match sink.on_breach(breach) {
                Ok(()) => info!(sink = sink.name(), run_id = %breach.run_id, "alert delivered"),
                Err(e) => {
                    error!(sink = sink.name(), error = %e, "alert failed");
                    failed.push(format!("{}: {}", sink.name(), e));
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(failed.join("; "))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingAlert;
    use super::*;
    use std::rc::Rc;

    fn breach() -> Breach {
        Breach {
            run_id: "r-1".to_string(),
            reasons: BreachReasons {
                malicious: true,
                drift: false,
                mismatch: false,
            },
            findings: 2,
        }
    }

    struct Shared(Rc<RecordingAlert>);

    impl AlertSink for Shared {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn on_breach(&self, breach: &Breach) -> Result<(), String> {
            self.0.on_breach(breach)
        }
    }

    #[test]
    fn test_pw018_console_alert() {
        assert!(ConsoleAlert.on_breach(&breach()).is_ok());
    }

    #[test]
    fn test_pw018_event_log_alert() {
        let dir = tempfile::tempdir().unwrap();
        let sink = EventLogAlert {
            path: dir.path().join("events.jsonl"),
        };
        sink.on_breach(&breach()).unwrap();
        let events = eventlog::read_events(&sink.path).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_pw018_fan_out_continues_past_failure() {
        let failing = Rc::new(RecordingAlert {
            fail: true,
            ..Default::default()
        });
        let healthy = Rc::new(RecordingAlert::default());

        let mut fan = FanOut::new();
        fan.push(Box::new(Shared(failing.clone())));
        fan.push(Box::new(Shared(healthy.clone())));
        assert_eq!(fan.len(), 2);

        let err = fan.on_breach(&breach()).unwrap_err();
        assert!(err.contains("sink down"));
        assert_eq!(failing.received.borrow().len(), 1);
        assert_eq!(healthy.received.borrow().len(), 1);
    }

    #[test]
    fn test_pw018_empty_fan_out_ok() {
        let fan = FanOut::new();
        assert!(fan.is_empty());
        assert!(fan.on_breach(&breach()).is_ok());
    }
}
