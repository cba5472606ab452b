pub mod assets;
pub mod exchange;
pub mod format;

pub use assets::{
    AssetDescriptor, AssetService, ConversionRate, Money, RateEntry, SettingsSource,
    StaticAssets,
};
pub use exchange::{
    BASE_ASSET_SETTING, BalanceReceiver, BalanceSender, DEFAULT_POLL_INTERVAL, ExchangeConfig,
    MirrorBalance, MirrorView, UpdateMode, create_balance_channel,
};
pub use format::format_amount;
