// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 任务调度：取帧、后处理、输出
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

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::{model::PostProcess, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一帧
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: PostProcess<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始后处理...");
    let now = Instant::now();
    let result = model.postprocess(&frame)?;
    let elapsed = now.elapsed();
    info!("后处理完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧反复后处理，统计平均耗时
#[derive(Debug)]
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 1000 }
  }
}

impl RepeatShotTask {
  /// 前两次视为预热，不计入平均值
  const WARMUP: usize = 2;

  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: PostProcess<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，重复 {} 次", self.times);
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = Instant::now();
      let result = model.postprocess(&frame)?;
      let elapsed = now.elapsed();
      info!("({})后处理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    if times.len() > Self::WARMUP {
      let measured = &times[Self::WARMUP..];
      warn!(
        "平均后处理时间: {:.2?}",
        measured.iter().sum::<Duration>() / measured.len() as u32
      );
    } else {
      warn!("重复次数不足 {}，不统计平均时间", Self::WARMUP + 1);
    }

    Ok(())
  }
}

/// 逐帧处理输入直到耗尽，或达到指定帧数
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: PostProcess<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");

    let mut frame_index = 0;
    let mut now = Instant::now();
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧", frame_index);
      let result = model.postprocess(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("后处理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("负数输入")]
  struct Negative;

  struct Double;

  impl PostProcess for Double {
    type Input = i32;
    type Output = i32;
    type Error = Negative;

    fn postprocess(&self, input: &i32) -> Result<i32, Negative> {
      if *input < 0 { Err(Negative) } else { Ok(input * 2) }
    }
  }

  #[derive(Default)]
  struct Collect(RefCell<Vec<i32>>);

  impl Render<i32, i32> for &Collect {
    type Error = Negative;

    fn render_result(&self, _frame: &i32, result: &i32) -> Result<(), Negative> {
      self.0.borrow_mut().push(*result);
      Ok(())
    }
  }

  #[test]
  fn test_one_shot_takes_first_frame() {
    let out = Collect::default();
    OneShotTask
      .run_task(vec![3, 4].into_iter(), Double, &out)
      .unwrap();
    assert_eq!(*out.0.borrow(), vec![6]);

    assert!(
      OneShotTask
        .run_task(Vec::new().into_iter(), Double, &out)
        .is_err()
    );
  }

  #[test]
  fn test_repeat_shot_runs_requested_times() {
    let out = Collect::default();
    RepeatShotTask::default()
      .with_times(5)
      .run_task(vec![1].into_iter(), Double, &out)
      .unwrap();
    assert_eq!(*out.0.borrow(), vec![2; 5]);

    // 次数不足以统计平均值时也不应出错
    RepeatShotTask::default()
      .with_times(1)
      .run_task(vec![1].into_iter(), Double, &out)
      .unwrap();
  }

  #[test]
  fn test_continuous_stops_at_frame_number() {
    let out = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(vec![1, 2, 3].into_iter(), Double, &out)
      .unwrap();
    assert_eq!(*out.0.borrow(), vec![2, 4]);
  }

  #[test]
  fn test_continuous_propagates_errors() {
    let out = Collect::default();
    let result = ContinuousTask::default().run_task(vec![1, -1, 3].into_iter(), Double, &out);
    assert!(result.is_err());
    assert_eq!(*out.0.borrow(), vec![2]);
  }
}
