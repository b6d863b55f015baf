use solana_program::{
    clock::{Clock, UnixTimestamp},
    program_error::ProgramError,
    sysvar::Sysvar,
};

/// Source of the current time for an instruction. Sampled once per
/// instruction; the engine only ever sees the resulting timestamp.
pub trait TimeSource {
    fn now(&self) -> Result<UnixTimestamp, ProgramError>;
}

/// Reads the cluster `Clock` sysvar.
pub struct SysvarClock;

impl TimeSource for SysvarClock {
    fn now(&self) -> Result<UnixTimestamp, ProgramError> {
        Ok(Clock::get()?.unix_timestamp)
    }
}

#[derive(Debug, Copy, Clone)]
pub struct FixedClock(pub UnixTimestamp);

impl TimeSource for FixedClock {
    fn now(&self) -> Result<UnixTimestamp, ProgramError> {
        Ok(self.0)
    }
}
