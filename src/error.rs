use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Неверный формат PIN: {0}")]
    InvalidCredential(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl LockError {
    pub fn service_unavailable<T>(msg: impl Into<String>) -> Result<T> {
        Err(LockError::ServiceUnavailable(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, LockError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! lock_error {
    (invalid_credential, $($arg:tt)*) => {
        $crate::error::LockError::InvalidCredential(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::LockError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::LockError::Internal(format!($($arg)*))
    };
}
