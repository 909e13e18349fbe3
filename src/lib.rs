#![doc = include_str!("../README.md")]

pub use scriptable_core::*;

pub mod prelude {
    pub use scriptable_core::prelude::*;
    pub use scriptable_core::types::*;

    #[cfg(feature = "bevy_plugin")]
    pub use scriptable_bevy_plugin::{
        RunningAction, ScriptableActionFinished, ScriptableLocation, ScriptablePlugin, ScriptableWorld,
    };
}
