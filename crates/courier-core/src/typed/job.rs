//! Job trait - 型付き Job の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`)
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Job は job type 名と payload の型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct CacheImages {
///     voter_we_vote_id: String,
/// }
///
/// impl Job for CacheImages {
///     const TYPE: &'static str = "voter_cache_facebook_images_process";
/// }
/// ```
///
/// `TYPE` はメッセージの `Function` 属性と一致させます。
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}
