//! 위치 추적 관련 에러 타입

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdcError {
    #[error("유효하지 않은 형식: {0}")]
    InvalidFormat(String),

    #[error("비교할 수 없는 binlog 파일명 형식: '{left}' vs '{right}'")]
    IncompatibleFormat { left: String, right: String },

    #[error("체크포인트에 필수 필드가 없습니다: {0}")]
    MissingField(&'static str),

    #[error("설정 에러: {0}")]
    Config(String),

    #[error("시그널 처리 에러: {0}")]
    Signal(String),

    #[error("오프셋 저장소 에러: {0}")]
    Store(String),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("정규식 에러: {0}")]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, CdcError>;
