use std::io::Write;

use intervalkit_core::error::EffectError;
use intervalkit_core::EffectEmitter;

/// Rings the terminal bell and prints flashes to stderr. Whether a record
/// wants sound or flash at all is decided by its own signal preferences
/// before either method is called.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalEffects;

impl EffectEmitter for TerminalEffects {
    fn beep(&self, _duration_ms: u64, _frequency_hz: u32) -> Result<(), EffectError> {
        let mut err = std::io::stderr();
        err.write_all(b"\x07")
            .and_then(|_| err.flush())
            .map_err(|e| EffectError::Blocked {
                effect: "terminal bell",
                reason: e.to_string(),
            })
    }

    fn flash(&self, duration_ms: u64, color: &str) -> Result<(), EffectError> {
        eprintln!("[flash {color} {duration_ms}ms]");
        Ok(())
    }
}
