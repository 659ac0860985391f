//! Track log commands.
//!
//! Every TrackLog-level operation implements [`Command`], so hosts can run them
//! one at a time or compose them with [`ChainedCommands`].

use log::{debug, info};

use crate::{Result, TrackLog};

/// An operation that edits a track log in place.
pub trait Command: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> String;

    /// Apply the command and return how many items it produced or changed.
    fn run(&self, tracklog: &mut TrackLog) -> Result<usize>;
}

/// Runs commands in order, stopping at the first error.
#[derive(Default)]
pub struct ChainedCommands {
    pub commands: Vec<Box<dyn Command>>,
}

impl ChainedCommands {
    pub fn new(commands: Vec<Box<dyn Command>>) -> Self {
        Self { commands }
    }

    pub fn push(mut self, command: impl Command + 'static) -> Self {
        self.commands.push(Box::new(command));
        self
    }
}

impl Command for ChainedCommands {
    fn name(&self) -> String {
        self.commands
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn run(&self, tracklog: &mut TrackLog) -> Result<usize> {
        let mut total = 0;
        for command in &self.commands {
            debug!("[Command] Running '{}'", command.name());
            let n = command.run(tracklog)?;
            info!("[Command] '{}' affected {} items", command.name(), n);
            total += n;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Point, WayPoint};

    struct AddWayPoint;

    impl Command for AddWayPoint {
        fn name(&self) -> String {
            "Add".to_string()
        }

        fn run(&self, tracklog: &mut TrackLog) -> Result<usize> {
            tracklog.waypoints.push(WayPoint::new(Point::new(0.0, 0.0)));
            Ok(1)
        }
    }

    struct Fail;

    impl Command for Fail {
        fn name(&self) -> String {
            "Fail".to_string()
        }

        fn run(&self, _tracklog: &mut TrackLog) -> Result<usize> {
            Err(Error::EmptyRoute)
        }
    }

    #[test]
    fn test_chain_sums_counts() {
        let chain = ChainedCommands::default().push(AddWayPoint).push(AddWayPoint);
        let mut log = TrackLog::default();
        assert_eq!(chain.run(&mut log).unwrap(), 2);
        assert_eq!(log.waypoints.len(), 2);
        assert_eq!(chain.name(), "Add, Add");
    }

    #[test]
    fn test_chain_stops_at_first_error() {
        let chain = ChainedCommands::default()
            .push(AddWayPoint)
            .push(Fail)
            .push(AddWayPoint);
        let mut log = TrackLog::default();
        assert!(matches!(chain.run(&mut log), Err(Error::EmptyRoute)));
        assert_eq!(log.waypoints.len(), 1);
    }
}
