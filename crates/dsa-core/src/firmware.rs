//! Firmware user settings
//!
//! Profile data handed to the core before boot: nickname, birthday,
//! language and whether the console should boot through the firmware menu.

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum nickname length in UTF-16 code units
pub const MAX_NICKNAME_LEN: usize = 10;

/// Leap year used to validate birthdays, so February 29 is accepted
pub const REFERENCE_YEAR: u32 = 2008;

/// Firmware language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Language {
    Japanese = 0,
    #[default]
    English = 1,
    French = 2,
    German = 3,
    Italian = 4,
    Spanish = 5,
    Chinese = 6,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Japanese,
        Language::English,
        Language::French,
        Language::German,
        Language::Italian,
        Language::Spanish,
        Language::Chinese,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::Japanese => "Japanese",
            Language::English => "English",
            Language::French => "French",
            Language::German => "German",
            Language::Italian => "Italian",
            Language::Spanish => "Spanish",
            Language::Chinese => "Chinese",
        }
    }
}

impl TryFrom<u8> for Language {
    type Error = SettingsError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Language::ALL
            .into_iter()
            .find(|language| language.id() == id)
            .ok_or(SettingsError::UnknownLanguage(id))
    }
}

impl From<Language> for u8 {
    fn from(language: Language) -> u8 {
        language.id()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of days in `month` of the reference year, or `None` for an invalid month
pub fn days_in_month(month: u8) -> Option<u8> {
    let leap = REFERENCE_YEAR % 4 == 0 && (REFERENCE_YEAR % 100 != 0 || REFERENCE_YEAR % 400 == 0);
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => Some(31),
        4 | 6 | 9 | 11 => Some(30),
        2 if leap => Some(29),
        2 => Some(28),
        _ => None,
    }
}

/// Firmware profile settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirmwareSettings {
    pub nickname: String,
    pub birthday_month: u8,
    pub birthday_day: u8,
    pub language: Language,
    pub should_firmware_boot: bool,
}

impl Default for FirmwareSettings {
    fn default() -> Self {
        Self {
            nickname: "Player".to_string(),
            birthday_month: 1,
            birthday_day: 1,
            language: Language::default(),
            should_firmware_boot: false,
        }
    }
}

impl FirmwareSettings {
    pub fn set_nickname(&mut self, nickname: &str) -> Result<(), SettingsError> {
        let units = nickname.encode_utf16().count();
        if units > MAX_NICKNAME_LEN {
            return Err(SettingsError::NicknameTooLong(units));
        }
        self.nickname = nickname.to_string();
        Ok(())
    }

    /// Set the birthday month; a day that no longer fits the month resets to 1
    pub fn set_birthday_month(&mut self, month: u8) -> Result<(), SettingsError> {
        let days = days_in_month(month).ok_or(SettingsError::InvalidMonth(month))?;
        self.birthday_month = month;
        if self.birthday_day > days {
            self.birthday_day = 1;
        }
        Ok(())
    }

    pub fn set_birthday_day(&mut self, day: u8) -> Result<(), SettingsError> {
        let month = self.birthday_month;
        let days = days_in_month(month).ok_or(SettingsError::InvalidMonth(month))?;
        if day == 0 || day > days {
            return Err(SettingsError::InvalidDay { month, day });
        }
        self.birthday_day = day;
        Ok(())
    }

    pub fn set_language(&mut self, id: u8) -> Result<(), SettingsError> {
        self.language = Language::try_from(id)?;
        Ok(())
    }

    /// Check settings loaded from a store
    pub fn validate(&self) -> Result<(), SettingsError> {
        let units = self.nickname.encode_utf16().count();
        if units > MAX_NICKNAME_LEN {
            return Err(SettingsError::NicknameTooLong(units));
        }
        let days = days_in_month(self.birthday_month)
            .ok_or(SettingsError::InvalidMonth(self.birthday_month))?;
        if self.birthday_day == 0 || self.birthday_day > days {
            return Err(SettingsError::InvalidDay {
                month: self.birthday_month,
                day: self.birthday_day,
            });
        }
        Ok(())
    }

    /// Nickname as UTF-16 code units, the form the core stores
    pub fn nickname_utf16(&self) -> Vec<u16> {
        self.nickname.encode_utf16().collect()
    }

    /// Serialize to the settings-store JSON form
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse the settings-store JSON form
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
