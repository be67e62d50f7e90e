//! Windowed target/decoy ratio estimation and the resulting score -> PEP curves.

mod curve;
mod isotonic;
mod map;
mod snapshot;
mod window;

pub use curve::{
    CalibrationCurve,
    CurvePoint,
};
pub use isotonic::antitonic_fit;
pub use map::{
    MIN_OBSERVATIONS,
    MIN_SEPARATION_AUC,
    TargetDecoyMap,
};
pub use snapshot::MapSnapshot;
pub use window::{
    CalibrationParams,
    DEFAULT_CHECK_INTERVAL,
    DEFAULT_WINDOW_FRACTION,
    DecoyWindow,
    MIN_WINDOW_SIZE,
};
