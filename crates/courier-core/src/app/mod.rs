//! App - アプリケーション層
//!
//! ports を組み合わせて worker のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **WorkerBuilder**: worker の構築とワイヤリング
//! - **WorkerLoop**: ジョブ実行ループ（receive→parse→dispatch→decide→delete）
//! - **Dispatcher**: job type から handler を引き、エラーと panic を捕まえる
//! - **Shutdown**: 協調的な停止シグナル
//! - **WorkerStats**: ループのカウンタ

pub mod builder;
pub mod dispatcher;
pub mod shutdown;
pub mod status;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, WorkerBuilder};
pub use self::dispatcher::{DispatchResult, Dispatcher};
pub use self::shutdown::{Shutdown, ShutdownSignal};
pub use self::status::WorkerStats;
pub use self::worker_loop::{Tick, WorkerLoop};
