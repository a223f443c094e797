use serde::Serialize;
use utoipa::ToSchema;

use super::models::ForecastDay;

const HEAVY_RAIN_CHANCE: f64 = 70.0;
const LIGHT_RAIN_CHANCE: f64 = 40.0;
const LOW_HUMIDITY: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Recommendation {
    pub message: String,
    pub action: String,
}

impl Recommendation {
    fn new(message: &str, action: &str) -> Self {
        Self { message: message.to_owned(), action: action.to_owned() }
    }
}

/// Irrigation advice for today's forecast. `None` without a forecast day.
pub fn recommend(days: &[ForecastDay]) -> Option<Recommendation> {
    let today = &days.first()?.day;
    let advice = if today.daily_chance_of_rain > HEAVY_RAIN_CHANCE {
        Recommendation::new("Heavy rain expected - reduce irrigation", "Skip scheduled watering")
    } else if today.daily_chance_of_rain > LIGHT_RAIN_CHANCE {
        Recommendation::new("Light rain possible - monitor soil moisture", "Reduce watering duration")
    } else if today.avghumidity < LOW_HUMIDITY {
        Recommendation::new("Low humidity - increase irrigation", "Extend watering time")
    } else {
        Recommendation::new("Normal conditions - maintain regular schedule", "Continue as planned")
    };
    Some(advice)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::weather::models::{Condition, DaySummary};

    fn day(rain: f64, humidity: f64) -> ForecastDay {
        ForecastDay {
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            day: DaySummary {
                maxtemp_c: 31.0,
                mintemp_c: 24.0,
                condition: Condition { text: "Patchy rain".to_owned(), icon: String::new() },
                avghumidity: humidity,
                daily_chance_of_rain: rain,
                maxwind_kph: 10.0,
            },
        }
    }

    fn action(rain: f64, humidity: f64) -> String {
        recommend(&[day(rain, humidity)]).unwrap().action
    }

    #[test]
    fn rain_chance_dominates() {
        assert_eq!(action(71.0, 10.0), "Skip scheduled watering");
        assert_eq!(action(70.0, 10.0), "Reduce watering duration");
        assert_eq!(action(41.0, 90.0), "Reduce watering duration");
    }

    #[test]
    fn dry_air_extends_watering() {
        assert_eq!(action(40.0, 29.0), "Extend watering time");
        assert_eq!(action(0.0, 30.0), "Continue as planned");
    }

    #[test]
    fn only_the_first_day_counts() {
        let advice = recommend(&[day(0.0, 60.0), day(95.0, 60.0)]).unwrap();
        assert_eq!(advice.message, "Normal conditions - maintain regular schedule");
    }

    #[test]
    fn no_forecast_no_advice() {
        assert!(recommend(&[]).is_none());
    }
}
