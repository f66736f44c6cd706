use std::convert::TryFrom;

use crate::error::Error;
use crate::Result;

pub mod binary;
#[cfg(test)]
mod test;

/// 文字列とバイナリに許容するデフォルトの最大バイト長です。
pub const DEFAULT_MAX_STRING_LENGTH: usize = 16 * 1024 * 1024;

/// map/set/list に許容するデフォルトの最大要素数です。
pub const DEFAULT_MAX_CONTAINER_SIZE: usize = 16 * 1024 * 1024;

/// `skip()` が辿ることのできるデフォルトの最大ネスト数です。
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// ワイヤ上で値の型を識別する 1 バイトのタグです。数値はすべての言語の実装で共通の契約であり変更できません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TType {
  /// フィールド列の終端
  Stop = 0,
  Void = 1,
  Bool = 2,
  Byte = 3,
  Double = 4,
  I16 = 6,
  I32 = 8,
  I64 = 10,
  String = 11,
  Struct = 12,
  Map = 13,
  Set = 14,
  List = 15,
}

impl TryFrom<u8> for TType {
  type Error = Error;

  fn try_from(value: u8) -> Result<TType> {
    match value {
      0 => Ok(TType::Stop),
      1 => Ok(TType::Void),
      2 => Ok(TType::Bool),
      3 => Ok(TType::Byte),
      4 => Ok(TType::Double),
      6 => Ok(TType::I16),
      8 => Ok(TType::I32),
      10 => Ok(TType::I64),
      11 => Ok(TType::String),
      12 => Ok(TType::Struct),
      13 => Ok(TType::Map),
      14 => Ok(TType::Set),
      15 => Ok(TType::List),
      unexpected => Err(Error::IllegalTypeTag { value: unexpected }),
    }
  }
}

/// RPC エンベロープの種別です。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
  Call = 1,
  Reply = 2,
  Exception = 3,
  Oneway = 4,
}

impl TryFrom<u8> for MessageType {
  type Error = Error;

  fn try_from(value: u8) -> Result<MessageType> {
    match value {
      1 => Ok(MessageType::Call),
      2 => Ok(MessageType::Reply),
      3 => Ok(MessageType::Exception),
      4 => Ok(MessageType::Oneway),
      unexpected => Err(Error::IllegalMessageType { value: unexpected }),
    }
  }
}

/// 1 つの RPC 呼び出しまたは応答を識別するヘッダ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
  /// 呼び出し対象のメソッド名
  pub name: String,
  pub message_type: MessageType,
  /// 呼び出しと応答を対応付けるためのシーケンス番号
  pub seq_id: i32,
}

impl MessageHeader {
  pub fn new<S: Into<String>>(name: S, message_type: MessageType, seq_id: i32) -> MessageHeader {
    MessageHeader { name: name.into(), message_type, seq_id }
  }
}

/// 構造体の各フィールドの前に置かれるヘッダ。`field_type` が `TType::Stop` の場合 `id` はワイヤ上に現れません。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHeader {
  pub field_type: TType,
  pub id: i16,
}

impl FieldHeader {
  pub fn new(field_type: TType, id: i16) -> FieldHeader {
    FieldHeader { field_type, id }
  }

  /// フィールド列の終端を表すヘッダ。
  pub fn stop() -> FieldHeader {
    FieldHeader { field_type: TType::Stop, id: 0 }
  }

  pub fn is_stop(&self) -> bool {
    self.field_type == TType::Stop
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapHeader {
  pub key_type: TType,
  pub value_type: TType,
  pub size: usize,
}

impl MapHeader {
  pub fn new(key_type: TType, value_type: TType, size: usize) -> MapHeader {
    MapHeader { key_type, value_type, size }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListHeader {
  pub element_type: TType,
  pub size: usize,
}

impl ListHeader {
  pub fn new(element_type: TType, size: usize) -> ListHeader {
    ListHeader { element_type, size }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetHeader {
  pub element_type: TType,
  pub size: usize,
}

impl SetHeader {
  pub fn new(element_type: TType, size: usize) -> SetHeader {
    SetHeader { element_type, size }
  }
}

/// 宣言された長さを信頼せずに検査するための上限値です。上限を超える長さを読み込んだ場合、メモリを確保する前に
/// `Error::LengthTooLarge` となります。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolLimits {
  /// 文字列とバイナリの最大バイト長
  pub max_string_length: usize,
  /// map/set/list の最大要素数
  pub max_container_size: usize,
  /// `skip()` の最大ネスト数
  pub max_depth: usize,
}

impl Default for ProtocolLimits {
  fn default() -> ProtocolLimits {
    ProtocolLimits {
      max_string_length: DEFAULT_MAX_STRING_LENGTH,
      max_container_size: DEFAULT_MAX_CONTAINER_SIZE,
      max_depth: DEFAULT_MAX_DEPTH,
    }
  }
}

/// 型付きの値をバイトストリームへ書き込み、またバイトストリームから復元するためのプロトコルです。
/// 各 write メソッドには対になる read メソッドが存在し、書き込んだバイト列から同じ値を復元します。
pub trait Protocol {
  fn write_message_begin(&mut self, header: &MessageHeader) -> Result<()>;
  fn write_message_end(&mut self) -> Result<()>;
  fn write_struct_begin(&mut self, name: &str) -> Result<()>;
  fn write_struct_end(&mut self) -> Result<()>;
  fn write_field_begin(&mut self, header: &FieldHeader) -> Result<()>;
  fn write_field_end(&mut self) -> Result<()>;
  fn write_field_stop(&mut self) -> Result<()>;
  fn write_map_begin(&mut self, header: &MapHeader) -> Result<()>;
  fn write_map_end(&mut self) -> Result<()>;
  fn write_list_begin(&mut self, header: &ListHeader) -> Result<()>;
  fn write_list_end(&mut self) -> Result<()>;
  fn write_set_begin(&mut self, header: &SetHeader) -> Result<()>;
  fn write_set_end(&mut self) -> Result<()>;
  fn write_bool(&mut self, value: bool) -> Result<()>;
  fn write_byte(&mut self, value: i8) -> Result<()>;
  fn write_i16(&mut self, value: i16) -> Result<()>;
  fn write_i32(&mut self, value: i32) -> Result<()>;
  fn write_i64(&mut self, value: i64) -> Result<()>;
  fn write_double(&mut self, value: f64) -> Result<()>;
  fn write_string(&mut self, value: &str) -> Result<()>;
  fn write_binary(&mut self, value: &[u8]) -> Result<()>;

  fn read_message_begin(&mut self) -> Result<MessageHeader>;
  fn read_message_end(&mut self) -> Result<()>;
  fn read_struct_begin(&mut self) -> Result<()>;
  fn read_struct_end(&mut self) -> Result<()>;
  /// フィールドヘッダを読み込みます。返値の `is_stop()` が true の場合、フィールド ID は読み込まれていません。
  fn read_field_begin(&mut self) -> Result<FieldHeader>;
  fn read_field_end(&mut self) -> Result<()>;
  fn read_map_begin(&mut self) -> Result<MapHeader>;
  fn read_map_end(&mut self) -> Result<()>;
  fn read_list_begin(&mut self) -> Result<ListHeader>;
  fn read_list_end(&mut self) -> Result<()>;
  fn read_set_begin(&mut self) -> Result<SetHeader>;
  fn read_set_end(&mut self) -> Result<()>;
  fn read_bool(&mut self) -> Result<bool>;
  fn read_byte(&mut self) -> Result<i8>;
  fn read_i16(&mut self) -> Result<i16>;
  fn read_i32(&mut self) -> Result<i32>;
  fn read_i64(&mut self) -> Result<i64>;
  fn read_double(&mut self) -> Result<f64>;
  fn read_string(&mut self) -> Result<String>;
  fn read_binary(&mut self) -> Result<Vec<u8>>;

  /// 下位のトランスポートに書き込み済みのデータを送出させます。
  fn flush(&mut self) -> Result<()>;

  /// このプロトコルに設定されている上限値です。
  fn limits(&self) -> &ProtocolLimits;
}

/// 指定された型の値を 1 つ読み飛ばします。struct/map/set/list は内部の値を再帰的に読み飛ばします。
pub fn skip<P: Protocol + ?Sized>(protocol: &mut P, ttype: TType) -> Result<()> {
  let max_depth = protocol.limits().max_depth;
  skip_with_depth(protocol, ttype, max_depth)
}

fn skip_with_depth<P: Protocol + ?Sized>(protocol: &mut P, ttype: TType, depth: usize) -> Result<()> {
  match ttype {
    TType::Stop | TType::Void => Ok(()),
    TType::Bool => protocol.read_bool().map(|_| ()),
    TType::Byte => protocol.read_byte().map(|_| ()),
    TType::Double => protocol.read_double().map(|_| ()),
    TType::I16 => protocol.read_i16().map(|_| ()),
    TType::I32 => protocol.read_i32().map(|_| ()),
    TType::I64 => protocol.read_i64().map(|_| ()),
    TType::String => protocol.read_binary().map(|_| ()),
    TType::Struct | TType::Map | TType::Set | TType::List if depth == 0 => {
      Err(Error::DepthLimitExceeded { maximum: protocol.limits().max_depth })
    }
    TType::Struct => {
      protocol.read_struct_begin()?;
      loop {
        let field = protocol.read_field_begin()?;
        if field.is_stop() {
          break;
        }
        skip_with_depth(protocol, field.field_type, depth - 1)?;
        protocol.read_field_end()?;
      }
      protocol.read_struct_end()
    }
    TType::Map => {
      let header = protocol.read_map_begin()?;
      verify_element_type(header.key_type)?;
      verify_element_type(header.value_type)?;
      for _ in 0..header.size {
        skip_with_depth(protocol, header.key_type, depth - 1)?;
        skip_with_depth(protocol, header.value_type, depth - 1)?;
      }
      protocol.read_map_end()
    }
    TType::Set => {
      let header = protocol.read_set_begin()?;
      verify_element_type(header.element_type)?;
      for _ in 0..header.size {
        skip_with_depth(protocol, header.element_type, depth - 1)?;
      }
      protocol.read_set_end()
    }
    TType::List => {
      let header = protocol.read_list_begin()?;
      verify_element_type(header.element_type)?;
      for _ in 0..header.size {
        skip_with_depth(protocol, header.element_type, depth - 1)?;
      }
      protocol.read_list_end()
    }
  }
}

/// 幅を持たない Stop と Void はコンテナの要素型として使用できません。
fn verify_element_type(ttype: TType) -> Result<()> {
  match ttype {
    TType::Stop | TType::Void => Err(Error::IllegalTypeTag { value: ttype as u8 }),
    _ => Ok(()),
  }
}
