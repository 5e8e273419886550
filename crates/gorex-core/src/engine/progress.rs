/// Coarse progress of a run, reported from the thread that drives the outer loop.
///
/// A run reports `Preparation`, `Sampling` and `Output` phases. Only `Sampling` carries a
/// task, measured in moves per replica and advanced once per swap block.
#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement { steps: u64 },
    TaskFinish,

    /// Free-form status line, e.g. a checkpoint commit.
    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards events to an optional callback; without one every event is dropped.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    pub fn message(&self, text: impl Into<String>) {
        if self.callback.is_some() {
            self.report(Progress::Message(text.into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::TaskIncrement { steps: 3 });
    }

    #[test]
    fn reporter_forwards_events_to_callback() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::TaskIncrement { steps } = event {
                seen.lock().unwrap().push(steps);
            }
        }));
        reporter.report(Progress::TaskIncrement { steps: 2 });
        reporter.report(Progress::PhaseFinish);
        reporter.report(Progress::TaskIncrement { steps: 5 });
        drop(reporter);
        assert_eq!(seen.into_inner().unwrap(), vec![2, 5]);
    }

    #[test]
    fn messages_arrive_as_message_events() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::Message(text) = event {
                seen.lock().unwrap().push(text);
            }
        }));
        reporter.message("checkpoint written at move 2000");
        drop(reporter);
        assert_eq!(
            seen.into_inner().unwrap(),
            vec!["checkpoint written at move 2000".to_string()]
        );
    }
}
