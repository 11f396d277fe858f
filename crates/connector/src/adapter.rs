//! 플랫폼 어댑터 추상화
//!
//! 각 스트리밍 플랫폼의 클라이언트는 [`PlatformAdapter`]를 구현하고,
//! [`AdapterFactory`]가 접속 정보로부터 어댑터를 만듭니다.
//! 커넥터는 (재)연결할 때마다 팩토리로 새 어댑터를 생성합니다.
//!
//! ```text
//!   Connector<F: AdapterFactory>
//!        |
//!   F::Adapter: PlatformAdapter
//!   ┌───────┬────────┬─────┐
//!   │Memory │ Kafka  │ ... │
//!   └───────┴────────┴─────┘
//! ```

use std::future::Future;

use bytes::Bytes;

use crate::config::ConnectionSettings;
use crate::error::ConnectorError;
use crate::platform::Platform;

/// 스트리밍 플랫폼 어댑터
///
/// 레코드는 인코딩된 바이트로 주고받으며 디코딩은 커넥터가 담당합니다.
pub trait PlatformAdapter: Send + 'static {
    /// 어댑터가 담당하는 플랫폼
    fn platform(&self) -> Platform;

    /// 플랫폼에 연결합니다.
    fn connect(&mut self) -> impl Future<Output = Result<(), ConnectorError>> + Send;

    /// 연결을 종료합니다.
    fn disconnect(&mut self) -> impl Future<Output = Result<(), ConnectorError>> + Send;

    /// 다음 레코드를 기다립니다. 스트림이 끝나면 `None`입니다.
    fn consume(&mut self) -> impl Future<Output = Result<Option<Bytes>, ConnectorError>> + Send;

    /// 레코드를 전송합니다.
    fn produce(&mut self, record: Bytes) -> impl Future<Output = Result<(), ConnectorError>> + Send;

    /// 연결 여부
    fn is_connected(&self) -> bool;
}

/// 어댑터 팩토리
pub trait AdapterFactory: Send + Sync + 'static {
    /// 생성하는 어댑터 타입
    type Adapter: PlatformAdapter;

    /// 접속 정보로 어댑터를 생성합니다 (연결은 하지 않음).
    fn create(&self, settings: &ConnectionSettings) -> Result<Self::Adapter, ConnectorError>;
}
