// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

pub mod config;
pub mod error;
pub mod markup;
pub mod notify;
pub mod portal;
pub mod report;
pub mod runner;
pub mod task;

#[cfg(test)]
mod testing;
