use byteorder::{BigEndian, ByteOrder};

use crate::error::Error;
use crate::transport::Transport;
use crate::Result;


/// フレーム長を表すプレフィクスのバイト長です。
pub const FRAME_LENGTH_SIZE: usize = 4;

/// 1 フレームのペイロードとして許容するデフォルトの最大バイト長です。
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16_384_000;

/// 下位のバイトストリームを 4 バイトのビッグエンディアン長プレフィクス付きフレームに区切るトランスポートです。
///
/// 書き込みはメモリ上に蓄積され `flush()` の呼び出しで 1 フレームとして送出されます。読み込みはフレーム単位で
/// バッファリングされ、バッファ内に十分なデータが残っている限り下位層へのアクセスは発生しません。
///
/// フレームの読み込み途中で失敗した場合、ストリーム上のフレーム境界は失われます。以降の読み込みはすべて同じ
/// エラーで失敗します。フレーム間でのクローズ (`EndOfFile` で 0 バイト) のみこの状態になりません。
pub struct FramedTransport<T: Transport> {
  inner: T,
  /// 前回の flush 以降に書き込まれたバイト列
  write_buffer: Vec<u8>,
  /// 現在のフレームのペイロード
  read_buffer: Vec<u8>,
  /// 現在のフレーム内で読み込み済みの位置
  position: usize,
  max_frame_size: usize,
  /// フレームの読み込みに失敗した場合のエラー
  failure: Option<Error>,
}

impl<T: Transport> FramedTransport<T> {
  pub fn new(inner: T) -> FramedTransport<T> {
    FramedTransport::with_max_frame_size(inner, DEFAULT_MAX_FRAME_SIZE)
  }

  /// フレームの最大長を指定して構築します。長さプレフィクスで表現できない値は `u32::MAX` に切り詰められます。
  pub fn with_max_frame_size(inner: T, max_frame_size: usize) -> FramedTransport<T> {
    let max_frame_size = std::cmp::min(max_frame_size, u32::MAX as usize);
    FramedTransport {
      inner,
      write_buffer: Vec::new(),
      read_buffer: Vec::new(),
      position: 0,
      max_frame_size,
      failure: None,
    }
  }

  pub fn max_frame_size(&self) -> usize {
    self.max_frame_size
  }

  /// 現在のフレームのうち読み込み済みのバイト数を返します。
  pub fn buffer_position(&self) -> usize {
    self.position
  }

  /// 現在のフレームに残っている未読のバイト数を返します。
  pub fn bytes_remaining_in_buffer(&self) -> usize {
    self.read_buffer.len() - self.position
  }

  /// 現在のフレームの未読部分を参照します。バッファを直接解析した呼び出し側は `consume_buffer()` で読み込み
  /// 位置を進めることができます。
  pub fn buffer(&self) -> &[u8] {
    &self.read_buffer[self.position..]
  }

  /// フレームの読み込みに失敗し、以降の読み込みができない状態の場合に true を返します。
  pub fn is_failed(&self) -> bool {
    self.failure.is_some()
  }

  /// コピーを行わずに読み込み位置を `length` バイト進めます。
  pub fn consume_buffer(&mut self, length: usize) -> Result<()> {
    self.check_failure()?;
    let remaining = self.bytes_remaining_in_buffer();
    if length > remaining {
      return Err(Error::BufferUnderflow { requested: length, remaining });
    }
    self.position += length;
    Ok(())
  }

  pub fn get_ref(&self) -> &T {
    &self.inner
  }

  pub fn get_mut(&mut self) -> &mut T {
    &mut self.inner
  }

  /// 下位層のトランスポートを取り出します。未送出の書き込みデータと未読のフレームは破棄されます。
  pub fn into_inner(self) -> T {
    self.inner
  }

  fn check_failure(&self) -> Result<()> {
    match &self.failure {
      Some(err) => Err(err.clone()),
      None => Ok(()),
    }
  }

  /// 以降の読み込みを失敗させる状態へ移行します。
  fn fail(&mut self, err: Error) -> Error {
    self.read_buffer.clear();
    self.position = 0;
    self.failure = Some(err.clone());
    err
  }

  /// 下位層から次のフレームを読み込みます。読み込みに失敗した場合、バッファは空の状態に戻されます。
  fn read_frame(&mut self) -> Result<()> {
    self.read_buffer.clear();
    self.position = 0;

    let mut prefix = [0u8; FRAME_LENGTH_SIZE];
    if let Err(err) = self.inner.read_exact(&mut prefix) {
      if let Error::EndOfFile { actual: 0, .. } = err {
        log::debug!("peer closed the stream between frames");
        return Err(err);
      }
      match &err {
        Error::EndOfFile { actual, .. } => log::warn!("stream closed inside a frame length prefix: {} bytes", actual),
        _ => log::warn!("failed to read a frame length prefix: {}", err),
      }
      return Err(self.fail(err));
    }

    let length = BigEndian::read_u32(&prefix) as usize;
    if length > self.max_frame_size {
      log::warn!("rejecting frame of {} bytes, max={}", length, self.max_frame_size);
      return Err(self.fail(Error::FrameTooLarge { length, maximum: self.max_frame_size }));
    }

    self.read_buffer.resize(length, 0u8);
    if let Err(err) = self.inner.read_exact(&mut self.read_buffer) {
      match &err {
        Error::EndOfFile { actual, .. } => {
          log::warn!("stream closed inside a frame: {} of {} bytes received", actual, length)
        }
        _ => log::warn!("failed to read a frame of {} bytes: {}", length, err),
      }
      return Err(self.fail(err));
    }
    log::trace!("frame read: {} bytes", length);
    Ok(())
  }
}

impl<T: Transport> Transport for FramedTransport<T> {
  /// 書き込みデータをメモリ上に蓄積します。下位層への I/O は発生しません。
  fn write(&mut self, buf: &[u8]) -> Result<()> {
    self.write_buffer.extend_from_slice(buf);
    Ok(())
  }

  /// 蓄積したデータを長さプレフィクスに続けて 1 フレームとして送出します。何も書き込まれていない場合は
  /// フレームを送出せず下位層の flush のみを行います。
  fn flush(&mut self) -> Result<()> {
    // 失敗時に再試行しても同じバイト列を二重に送らないよう先に取り出す
    let frame = std::mem::take(&mut self.write_buffer);
    if !frame.is_empty() {
      if frame.len() > self.max_frame_size {
        return Err(Error::FrameTooLarge { length: frame.len(), maximum: self.max_frame_size });
      }
      let mut prefix = [0u8; FRAME_LENGTH_SIZE];
      BigEndian::write_u32(&mut prefix, frame.len() as u32);
      self.inner.write(&prefix)?;
      self.inner.write(&frame)?;
      log::trace!("frame flushed: {} bytes", frame.len());
    }
    self.inner.flush()
  }

  /// 現在のフレームから読み込みます。要求されたバイト数がフレームに残っていない場合は残りを破棄して次の
  /// フレームを読み込みます。返されるバイト数は 1 フレームに含まれる分を超えません。
  fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
    self.check_failure()?;
    if buf.is_empty() {
      return Ok(0);
    }
    let remaining = self.bytes_remaining_in_buffer();
    if remaining < buf.len() {
      if remaining > 0 {
        log::warn!("discarding {} unread bytes of the current frame", remaining);
      }
      self.read_frame()?;
    }
    let length = std::cmp::min(buf.len(), self.bytes_remaining_in_buffer());
    buf[..length].copy_from_slice(&self.read_buffer[self.position..self.position + length]);
    self.position += length;
    Ok(length)
  }

  fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
    // 長さ 0 のフレームは読み込み量 0 となるが、ストリームの終端は read_frame() がエラーとして返す
    let mut filled = 0;
    while filled < buf.len() {
      filled += self.read(&mut buf[filled..])?;
    }
    Ok(())
  }
}

/// 接続ごとに同じ設定の `FramedTransport` を構築するためのファクトリです。
#[derive(Debug, Clone, Copy)]
pub struct FramedTransportFactory {
  max_frame_size: usize,
}

impl FramedTransportFactory {
  pub fn new(max_frame_size: usize) -> FramedTransportFactory {
    FramedTransportFactory { max_frame_size }
  }

  pub fn transport<T: Transport>(&self, inner: T) -> FramedTransport<T> {
    FramedTransport::with_max_frame_size(inner, self.max_frame_size)
  }
}

impl Default for FramedTransportFactory {
  fn default() -> FramedTransportFactory {
    FramedTransportFactory::new(DEFAULT_MAX_FRAME_SIZE)
  }
}
