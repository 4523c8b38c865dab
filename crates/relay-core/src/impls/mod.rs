//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryRecordSource**: ストリームごとの有界バッファ
//!
//! 本番用のレコードソース（コネクタの標準出力を読むものなど）は別クレートに置く。

pub mod inmem_source;

pub use self::inmem_source::{InMemoryRecordSource, SourceError};
