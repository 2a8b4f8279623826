// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod browser_engine;
pub mod fetcher;
pub mod proxy_rotator;
pub mod reqwest_engine;
pub mod traits;
