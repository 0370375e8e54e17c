mod poll_cycle;

pub use poll_cycle::PollCycleTask;
