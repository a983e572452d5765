mod trigger_sweeper;

pub use trigger_sweeper::TriggerSweeper;
