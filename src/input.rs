// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 模型输出输入源
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;

use crate::{FromUrl, frame::ObbFrame};

#[cfg(feature = "tensor_dump_input")]
mod tensor_dump;
#[cfg(feature = "tensor_dump_input")]
pub use self::tensor_dump::{TensorDumpInput, TensorDumpInputError, TensorDumpIter, read_dump};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "tensor_dump_input")]
  #[error("张量转储输入错误: {0}")]
  TensorDumpInputError(#[from] TensorDumpInputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "tensor_dump_input")]
  TensorDump(TensorDumpInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "tensor_dump_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == TensorDumpInput::SCHEME {
        let input = TensorDumpInput::from_url(url)?;
        return Ok(InputWrapper::TensorDump(input));
      }
    }
    let _ = url;
    Err(InputError::SchemeMismatch)
  }
}

impl IntoIterator for InputWrapper {
  type Item = ObbFrame;
  type IntoIter = InputWrapperIter;

  fn into_iter(self) -> Self::IntoIter {
    match self {
      #[cfg(feature = "tensor_dump_input")]
      InputWrapper::TensorDump(input) => InputWrapperIter::TensorDump(input.into_iter()),
    }
  }
}

pub enum InputWrapperIter {
  #[cfg(feature = "tensor_dump_input")]
  TensorDump(TensorDumpIter),
}

impl Iterator for InputWrapperIter {
  type Item = ObbFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "tensor_dump_input")]
      InputWrapperIter::TensorDump(input) => input.next(),
    }
  }
}
