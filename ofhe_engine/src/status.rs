#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The discriminated status every engine entry point returns.
pub enum Status {
    /// The call succeeded and any output handle is valid.
    Ok = 0,

    /// The call failed. The engine's last-error channel holds a description.
    Err = 1,
}

impl Status {
    /// Maps a raw status code onto [`Status`]. Every non-zero code is a failure.
    pub fn from_code(code: i32) -> Self {
        if code == 0 { Self::Ok } else { Self::Err }
    }

    /// Turns the status into an [`EngineResult`], keeping the raw code on failure.
    pub fn into_result(self) -> EngineResult<()> {
        match self {
            Self::Ok => Ok(()),
            Self::Err => Err(Fault { code: self as i32 }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("engine call failed with status {code}")]
/// A non-OK status returned by the engine.
///
/// # Remarks
/// A fault deliberately carries no message. The description lives in the
/// engine's last-error channel and must be fetched from the same engine, on the
/// same thread, immediately after the failing call.
pub struct Fault {
    /// The raw status code.
    pub code: i32,
}

impl Fault {
    /// The generic failure code used by both subsystems.
    pub const ERR: Self = Self { code: 1 };
}

/// The result of an engine call.
pub type EngineResult<T> = std::result::Result<T, Fault>;
