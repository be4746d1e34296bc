mod nag;
pub use nag::NagKind;
