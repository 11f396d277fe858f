//! 지원 스트리밍 플랫폼

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;

/// 스트리밍 플랫폼
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Apache Kafka
    Kafka,
    /// Apache Pulsar
    Pulsar,
    /// AWS Kinesis
    Kinesis,
    /// RabbitMQ
    RabbitMq,
    /// Redis Streams
    RedisStreams,
    /// NATS
    Nats,
    /// Azure Event Hubs
    EventHubs,
}

impl Platform {
    /// 전체 플랫폼 목록
    pub const ALL: [Platform; 7] = [
        Self::Kafka,
        Self::Pulsar,
        Self::Kinesis,
        Self::RabbitMq,
        Self::RedisStreams,
        Self::Nats,
        Self::EventHubs,
    ];

    /// 설정/메트릭 라벨에 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kafka => "kafka",
            Self::Pulsar => "pulsar",
            Self::Kinesis => "kinesis",
            Self::RabbitMq => "rabbitmq",
            Self::RedisStreams => "redis",
            Self::Nats => "nats",
            Self::EventHubs => "eventhubs",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kafka" => Ok(Self::Kafka),
            "pulsar" => Ok(Self::Pulsar),
            "kinesis" => Ok(Self::Kinesis),
            "rabbitmq" | "amqp" => Ok(Self::RabbitMq),
            "redis" | "redis_streams" | "redis-streams" => Ok(Self::RedisStreams),
            "nats" => Ok(Self::Nats),
            "eventhubs" | "event_hubs" | "azure-eventhubs" => Ok(Self::EventHubs),
            _ => Err(ConnectorError::UnknownPlatform(s.to_owned())),
        }
    }
}
