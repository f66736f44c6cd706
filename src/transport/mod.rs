use std::io::{ErrorKind, Read, Write};

use crate::error::Error;
use crate::Result;

pub mod framed;

/// プロトコル層がバイト列を送受信するために使用する下位層の抽象です。ソケット、メモリバッファ、ファイルなどの
/// 実装はこのトレイトを通して交換可能となります。
pub trait Transport {
  /// 指定されたバイト列を書き込みます。実装によっては `flush()` が呼び出されるまで実際の出力は行われません。
  fn write(&mut self, buf: &[u8]) -> Result<()>;

  /// 書き込み済みのデータを下位層へ送出します。
  fn flush(&mut self) -> Result<()>;

  /// 最大で `buf.len()` バイトを読み込み、実際に読み込んだバイト数を返します。0 はストリームの終端を表します。
  fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

  /// `buf` を満たすまで読み込みを行います。途中でストリームの終端に達した場合は `Error::EndOfFile` となります。
  fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
      match self.read(&mut buf[filled..])? {
        0 => return Err(Error::EndOfFile { expected: buf.len(), actual: filled }),
        len => filled += len,
      }
    }
    Ok(())
  }
}

impl<T: Transport + ?Sized> Transport for &mut T {
  fn write(&mut self, buf: &[u8]) -> Result<()> {
    (**self).write(buf)
  }
  fn flush(&mut self) -> Result<()> {
    (**self).flush()
  }
  fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
    (**self).read(buf)
  }
  fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
    (**self).read_exact(buf)
  }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
  fn write(&mut self, buf: &[u8]) -> Result<()> {
    (**self).write(buf)
  }
  fn flush(&mut self) -> Result<()> {
    (**self).flush()
  }
  fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
    (**self).read(buf)
  }
  fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
    (**self).read_exact(buf)
  }
}

/// `std::io::Read` と `std::io::Write` を実装するストリーム (`TcpStream` など) を `Transport` として扱うための
/// アダプタです。
#[derive(Debug)]
pub struct StreamTransport<S: Read + Write> {
  stream: S,
}

impl<S: Read + Write> StreamTransport<S> {
  pub fn new(stream: S) -> StreamTransport<S> {
    StreamTransport { stream }
  }

  pub fn get_ref(&self) -> &S {
    &self.stream
  }

  pub fn get_mut(&mut self) -> &mut S {
    &mut self.stream
  }

  pub fn into_inner(self) -> S {
    self.stream
  }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
  fn write(&mut self, buf: &[u8]) -> Result<()> {
    Write::write_all(&mut self.stream, buf).map_err(Error::from)
  }

  fn flush(&mut self) -> Result<()> {
    Write::flush(&mut self.stream).map_err(Error::from)
  }

  fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
    loop {
      match Read::read(&mut self.stream, buf) {
        Err(err) if err.kind() == ErrorKind::Interrupted => continue,
        result => return result.map_err(Error::from),
      }
    }
  }
}

/// メモリ上のバイト配列を読み書きするトランスポートです。書き込んだデータは末尾に追加され、読み込みは先頭から
/// 順に消費されます。
#[derive(Debug, Default, Clone)]
pub struct MemoryBuffer {
  buffer: Vec<u8>,
  position: usize,
}

impl MemoryBuffer {
  pub fn new() -> MemoryBuffer {
    MemoryBuffer::default()
  }

  pub fn with_capacity(capacity: usize) -> MemoryBuffer {
    MemoryBuffer { buffer: Vec::with_capacity(capacity), position: 0 }
  }

  /// まだ読み込まれていないバイト列を参照します。
  pub fn bytes(&self) -> &[u8] {
    &self.buffer[self.position..]
  }

  /// まだ読み込まれていないバイト数です。
  pub fn available(&self) -> usize {
    self.buffer.len() - self.position
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
    self.position = 0;
  }

  /// 未読のバイト列を取り出してこのバッファを破棄します。
  pub fn into_inner(mut self) -> Vec<u8> {
    self.buffer.drain(..self.position);
    self.buffer
  }
}

impl From<Vec<u8>> for MemoryBuffer {
  fn from(buffer: Vec<u8>) -> MemoryBuffer {
    MemoryBuffer { buffer, position: 0 }
  }
}

impl Transport for MemoryBuffer {
  fn write(&mut self, buf: &[u8]) -> Result<()> {
    self.buffer.extend_from_slice(buf);
    Ok(())
  }

  fn flush(&mut self) -> Result<()> {
    Ok(())
  }

  fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
    let length = std::cmp::min(buf.len(), self.available());
    buf[..length].copy_from_slice(&self.buffer[self.position..self.position + length]);
    self.position += length;
    if self.position == self.buffer.len() {
      self.clear();
    }
    Ok(length)
  }
}
