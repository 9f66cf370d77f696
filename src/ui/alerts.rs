//! Alert texts shown by the pipeline.

use std::time::Duration;

use crate::models::Verdict;

use super::surfaces::{Alert, AlertCategory, AlertPriority};

/// Short confirmation after going back.
pub fn intervention_brief(verdict: &Verdict) -> Alert {
    Alert {
        title: "Short Video Blocked".into(),
        body: format!("{} blocked - navigated back", verdict.platform.surface_name()),
        category: AlertCategory::Intervention,
        priority: AlertPriority::Low,
        ongoing: false,
    }
}

pub fn intervention_detail(verdict: &Verdict) -> Alert {
    let name = verdict.platform.surface_name();
    Alert {
        title: "Short Video Blocked".into(),
        body: format!(
            "{name} was blocked\nDetection: {} ({:.0}% confidence)\nYou can change settings in the app.",
            verdict.method.label(),
            verdict.confidence * 100.0
        ),
        category: AlertCategory::Detail,
        priority: AlertPriority::Default,
        ongoing: false,
    }
}

pub fn safe_mode_entered(cooldown: Duration) -> Alert {
    let minutes = (cooldown.as_secs() / 60).max(1);
    Alert {
        title: "Safe Mode Activated".into(),
        body: format!(
            "Short video detection hit repeated errors and is paused. It will resume automatically in {minutes} minutes."
        ),
        category: AlertCategory::SafeMode,
        priority: AlertPriority::High,
        ongoing: false,
    }
}

pub fn safe_mode_exited() -> Alert {
    Alert {
        title: "Safe Mode Deactivated".into(),
        body: "Short video detection has been resumed.".into(),
        category: AlertCategory::SafeMode,
        priority: AlertPriority::Default,
        ongoing: false,
    }
}

pub fn paused(minutes: i64) -> Alert {
    Alert {
        title: "Short Video Blocker Paused".into(),
        body: format!("Blocker will resume in {minutes} minutes"),
        category: AlertCategory::Paused,
        priority: AlertPriority::Low,
        ongoing: true,
    }
}

pub fn resumed() -> Alert {
    Alert {
        title: "Short Video Blocker Resumed".into(),
        body: "Blocker is now active again".into(),
        category: AlertCategory::Resumed,
        priority: AlertPriority::Default,
        ongoing: false,
    }
}

pub fn permission_required(capability: &str) -> Alert {
    Alert {
        title: "Permission Required".into(),
        body: format!("Please grant the {capability} permission for the blocker to work properly."),
        category: AlertCategory::Permission,
        priority: AlertPriority::High,
        ongoing: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectionMethod, Platform};

    #[test]
    fn detail_mentions_platform_and_method() {
        let verdict = Verdict::target(Platform::Instagram, 0.9, DetectionMethod::ScreenName);
        let alert = intervention_detail(&verdict);
        assert!(alert.body.contains("Instagram Reels"));
        assert!(alert.body.contains("Screen Name"));
        assert_eq!(alert.category, AlertCategory::Detail);
    }

    #[test]
    fn safe_mode_alert_is_high_priority() {
        let alert = safe_mode_entered(Duration::from_secs(300));
        assert_eq!(alert.priority, AlertPriority::High);
        assert!(alert.body.contains("5 minutes"));
    }
}
