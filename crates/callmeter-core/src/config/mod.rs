mod settings;

pub use settings::{Command, Config, MeterSettings, Settings, WalletCommand, WalletSettings};
