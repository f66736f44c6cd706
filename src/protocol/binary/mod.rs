use std::convert::TryFrom;

use byteorder::{BigEndian, ByteOrder};

use crate::error::Error;
use crate::protocol::{
  FieldHeader, ListHeader, MapHeader, MessageHeader, MessageType, Protocol, ProtocolLimits, SetHeader, TType,
};
use crate::transport::Transport;
use crate::Result;


/// すべての整数をビッグエンディアンの固定長で表現するバイナリプロトコルです。
///
/// | 値 | ワイヤ表現 |
/// |---|---|
/// | bool | 1 バイト (1 = true) |
/// | byte, i16, i32, i64 | 1, 2, 4, 8 バイトの 2 の補数 |
/// | double | IEEE-754 のビットパターンを i64 として |
/// | string | i32 のバイト長 + UTF-8 バイト列 |
/// | message | string(name) + byte(type) + i32(seq_id) |
/// | field | byte(type) + i16(id)、STOP の場合は type のみ |
/// | map | byte(key) + byte(value) + i32(size) |
/// | list, set | byte(element) + i32(size) |
///
/// struct の開始/終了と各 end メソッドはワイヤ上に何も出力しません。書き込みはバッファリングされないため、
/// 送出を保証するには `flush()` を呼び出す必要があります。
pub struct BinaryProtocol<T: Transport> {
  transport: T,
  limits: ProtocolLimits,
}

impl<T: Transport> BinaryProtocol<T> {
  pub fn new(transport: T) -> BinaryProtocol<T> {
    BinaryProtocol::with_limits(transport, ProtocolLimits::default())
  }

  pub fn with_limits(transport: T, limits: ProtocolLimits) -> BinaryProtocol<T> {
    BinaryProtocol { transport, limits }
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn transport_mut(&mut self) -> &mut T {
    &mut self.transport
  }

  pub fn into_inner(self) -> T {
    self.transport
  }

  fn write_u8(&mut self, value: u8) -> Result<()> {
    self.transport.write(&[value])
  }

  fn read_u8(&mut self) -> Result<u8> {
    let mut buf = [0u8; 1];
    self.transport.read_exact(&mut buf)?;
    Ok(buf[0])
  }

  fn write_type(&mut self, ttype: TType) -> Result<()> {
    self.write_u8(ttype as u8)
  }

  fn read_type(&mut self) -> Result<TType> {
    TType::try_from(self.read_u8()?)
  }

  /// ワイヤ上の i32 で表現できる長さかを検査します。ヘッダの一部を書き込む前に呼び出す必要があります。
  fn check_length(length: usize) -> Result<i32> {
    if length > i32::MAX as usize {
      Err(Error::LengthTooLarge { length, maximum: i32::MAX as usize })
    } else {
      Ok(length as i32)
    }
  }

  /// i32 の長さを読み込み、負の値や上限を超える値を拒否します。
  fn read_length(&mut self, maximum: usize) -> Result<usize> {
    let length = self.read_i32()?;
    if length < 0 {
      log::warn!("negative length declared: {}", length);
      return Err(Error::NegativeLength { length });
    }
    let length = length as usize;
    if length > maximum {
      log::warn!("declared length {} exceeds the limit {}", length, maximum);
      return Err(Error::LengthTooLarge { length, maximum });
    }
    Ok(length)
  }
}

impl<T: Transport> Protocol for BinaryProtocol<T> {
  fn write_message_begin(&mut self, header: &MessageHeader) -> Result<()> {
    self.write_string(&header.name)?;
    self.write_u8(header.message_type as u8)?;
    self.write_i32(header.seq_id)
  }

  fn write_message_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn write_struct_begin(&mut self, _name: &str) -> Result<()> {
    Ok(())
  }

  fn write_struct_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn write_field_begin(&mut self, header: &FieldHeader) -> Result<()> {
    self.write_type(header.field_type)?;
    if header.is_stop() {
      Ok(())
    } else {
      self.write_i16(header.id)
    }
  }

  fn write_field_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn write_field_stop(&mut self) -> Result<()> {
    self.write_type(TType::Stop)
  }

  fn write_map_begin(&mut self, header: &MapHeader) -> Result<()> {
    let size = Self::check_length(header.size)?;
    self.write_type(header.key_type)?;
    self.write_type(header.value_type)?;
    self.write_i32(size)
  }

  fn write_map_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn write_list_begin(&mut self, header: &ListHeader) -> Result<()> {
    let size = Self::check_length(header.size)?;
    self.write_type(header.element_type)?;
    self.write_i32(size)
  }

  fn write_list_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn write_set_begin(&mut self, header: &SetHeader) -> Result<()> {
    let size = Self::check_length(header.size)?;
    self.write_type(header.element_type)?;
    self.write_i32(size)
  }

  fn write_set_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn write_bool(&mut self, value: bool) -> Result<()> {
    self.write_u8(if value { 1 } else { 0 })
  }

  fn write_byte(&mut self, value: i8) -> Result<()> {
    self.write_u8(value as u8)
  }

  fn write_i16(&mut self, value: i16) -> Result<()> {
    let mut buf = [0u8; 2];
    BigEndian::write_i16(&mut buf, value);
    self.transport.write(&buf)
  }

  fn write_i32(&mut self, value: i32) -> Result<()> {
    let mut buf = [0u8; 4];
    BigEndian::write_i32(&mut buf, value);
    self.transport.write(&buf)
  }

  fn write_i64(&mut self, value: i64) -> Result<()> {
    let mut buf = [0u8; 8];
    BigEndian::write_i64(&mut buf, value);
    self.transport.write(&buf)
  }

  fn write_double(&mut self, value: f64) -> Result<()> {
    self.write_i64(value.to_bits() as i64)
  }

  fn write_string(&mut self, value: &str) -> Result<()> {
    self.write_binary(value.as_bytes())
  }

  fn write_binary(&mut self, value: &[u8]) -> Result<()> {
    let length = Self::check_length(value.len())?;
    self.write_i32(length)?;
    if value.is_empty() {
      Ok(())
    } else {
      self.transport.write(value)
    }
  }

  fn read_message_begin(&mut self) -> Result<MessageHeader> {
    let name = self.read_string()?;
    let message_type = MessageType::try_from(self.read_u8()?)?;
    let seq_id = self.read_i32()?;
    Ok(MessageHeader { name, message_type, seq_id })
  }

  fn read_message_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn read_struct_begin(&mut self) -> Result<()> {
    Ok(())
  }

  fn read_struct_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn read_field_begin(&mut self) -> Result<FieldHeader> {
    match self.read_type()? {
      TType::Stop => Ok(FieldHeader::stop()),
      field_type => Ok(FieldHeader { field_type, id: self.read_i16()? }),
    }
  }

  fn read_field_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn read_map_begin(&mut self) -> Result<MapHeader> {
    let key_type = self.read_type()?;
    let value_type = self.read_type()?;
    let size = self.read_length(self.limits.max_container_size)?;
    Ok(MapHeader { key_type, value_type, size })
  }

  fn read_map_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn read_list_begin(&mut self) -> Result<ListHeader> {
    let element_type = self.read_type()?;
    let size = self.read_length(self.limits.max_container_size)?;
    Ok(ListHeader { element_type, size })
  }

  fn read_list_end(&mut self) -> Result<()> {
    Ok(())
  }

  fn read_set_begin(&mut self) -> Result<SetHeader> {
    let element_type = self.read_type()?;
    let size = self.read_length(self.limits.max_container_size)?;
    Ok(SetHeader { element_type, size })
  }

  fn read_set_end(&mut self) -> Result<()> {
    Ok(())
  }

  /// 1 以外の値はすべて false として扱います。
  fn read_bool(&mut self) -> Result<bool> {
    Ok(self.read_u8()? == 1)
  }

  fn read_byte(&mut self) -> Result<i8> {
    Ok(self.read_u8()? as i8)
  }

  fn read_i16(&mut self) -> Result<i16> {
    let mut buf = [0u8; 2];
    self.transport.read_exact(&mut buf)?;
    Ok(BigEndian::read_i16(&buf))
  }

  fn read_i32(&mut self) -> Result<i32> {
    let mut buf = [0u8; 4];
    self.transport.read_exact(&mut buf)?;
    Ok(BigEndian::read_i32(&buf))
  }

  fn read_i64(&mut self) -> Result<i64> {
    let mut buf = [0u8; 8];
    self.transport.read_exact(&mut buf)?;
    Ok(BigEndian::read_i64(&buf))
  }

  fn read_double(&mut self) -> Result<f64> {
    Ok(f64::from_bits(self.read_i64()? as u64))
  }

  fn read_string(&mut self) -> Result<String> {
    String::from_utf8(self.read_binary()?).map_err(Error::from)
  }

  fn read_binary(&mut self) -> Result<Vec<u8>> {
    let length = self.read_length(self.limits.max_string_length)?;
    let mut buffer = vec![0u8; length];
    self.transport.read_exact(&mut buffer)?;
    Ok(buffer)
  }

  fn flush(&mut self) -> Result<()> {
    self.transport.flush()
  }

  fn limits(&self) -> &ProtocolLimits {
    &self.limits
  }
}

/// 接続ごとに同じ上限値を持つ `BinaryProtocol` を構築するためのファクトリです。
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryProtocolFactory {
  limits: ProtocolLimits,
}

impl BinaryProtocolFactory {
  pub fn new(limits: ProtocolLimits) -> BinaryProtocolFactory {
    BinaryProtocolFactory { limits }
  }

  pub fn protocol<T: Transport>(&self, transport: T) -> BinaryProtocol<T> {
    BinaryProtocol::with_limits(transport, self.limits)
  }
}
