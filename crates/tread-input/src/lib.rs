//! Tank controls: held keys, key bindings, turret aim and change-detecting
//! input sampling.

pub mod aim;
pub mod bindings;
pub mod keyboard;
pub mod sampler;

pub use aim::{AbsoluteAim, AimMode, PointerEvent, RelativeAim, SurfaceRect};
pub use bindings::{BindingError, KeyMap, TankAction, key_from_name};
pub use keyboard::{KeyboardState, RawKeyEvent};
pub use sampler::{ANGLE_CHANGE_THRESHOLD, InputSampler, InputState};
