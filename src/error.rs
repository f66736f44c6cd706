use thiserror::Error as ThisError;

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum Error {
  #[error("end of stream reached: expected {expected} bytes, but only {actual} bytes available")]
  EndOfFile { expected: usize, actual: usize },

  #[error("negative length: {length}")]
  NegativeLength { length: i32 },
  #[error("too large length: {length}, max={maximum}")]
  LengthTooLarge { length: usize, maximum: usize },
  #[error("too large frame: {length}, max={maximum}")]
  FrameTooLarge { length: usize, maximum: usize },
  #[error("buffer underflow: {requested} bytes requested, but only {remaining} bytes remaining")]
  BufferUnderflow { requested: usize, remaining: usize },
  #[error("nesting too deep: max={maximum}")]
  DepthLimitExceeded { maximum: usize },

  #[error("illegal type tag: {value:#04X}")]
  IllegalTypeTag { value: u8 },
  #[error("illegal message type: {value:#04X}")]
  IllegalMessageType { value: u8 },
  #[error("invalid UTF-8 string: {message}")]
  InvalidUtf8 { message: String },

  #[error("underlying I/O layer error: {message}")]
  Io { kind: std::io::ErrorKind, message: String },
}

impl Error {
  /// ストリームの終端に達したことによる読み込み不足の場合に true を返します。
  pub fn is_end_of_file(&self) -> bool {
    matches!(self, Error::EndOfFile { .. })
  }
}

impl From<std::io::Error> for Error {
  fn from(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
      // 下位層が不足量を報告しないため読み込み量は不明
      Error::EndOfFile { expected: 0, actual: 0 }
    } else {
      Error::Io { kind: err.kind(), message: err.to_string() }
    }
  }
}

impl From<std::string::FromUtf8Error> for Error {
  fn from(err: std::string::FromUtf8Error) -> Error {
    Error::InvalidUtf8 { message: err.to_string() }
  }
}
