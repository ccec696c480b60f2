// ABOUTME: Configuration module for the identity server
// ABOUTME: Exposes environment-based configuration loading
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

/// Environment-based configuration management
pub mod environment;
