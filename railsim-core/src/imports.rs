#![allow(unused_imports)]

pub(crate) use crate::error::Error;
pub(crate) use crate::format_dbg;
pub(crate) use crate::lin_search_hint::*;
pub(crate) use crate::si;
pub(crate) use crate::traits::*;
pub(crate) use crate::uc;
pub(crate) use crate::utils;
pub(crate) use crate::utils::{almost_eq, almost_eq_uom, almost_le_uom, interp1d, is_sorted};
pub(crate) use crate::validate::*;
pub(crate) use crate::{early_err, early_fake_ok};
pub(crate) use anyhow::{anyhow, bail, ensure, Context};
pub(crate) use derive_more::IsVariant;
pub(crate) use easy_ext::ext;
pub(crate) use eng_fmt::FormatEng;
pub(crate) use log::{debug, info, trace, warn};
pub(crate) use nohash_hasher::{IntMap, IntSet};
pub(crate) use railsim_proc_macros::{HistoryVec, SerdeAPI};
pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use std::cmp::{self, Ordering};
pub(crate) use std::collections::{HashMap, HashSet};
pub(crate) use std::ffi::OsStr;
pub(crate) use std::fmt;
pub(crate) use std::fs::File;
pub(crate) use std::path::{Path, PathBuf};
pub(crate) use std::sync::Arc;
pub(crate) use uom::ConstZero;
