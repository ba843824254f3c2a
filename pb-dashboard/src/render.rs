//! Plain-text rendering of the dashboard panels

use pb_common::models::PredictionResult;
use pb_common::Prediction;
use std::fmt::Write;

use crate::history::HistoryEntry;
use crate::state::{HistoryView, UploadSession};

pub const SUCCESS_BANNER: &str = "File uploaded and analyzed successfully!";
pub const PLACEHOLDER: &str = "Upload an audio file to see analysis results";
pub const ERROR_TITLE: &str = "Upload/Analysis Error";
pub const DISCLAIMER: &str =
    "This analysis is for informational purposes only. Consult healthcare professionals for medical advice.";

/// A contact offered with disease results
pub struct Specialist {
    pub name: &'static str,
    pub role: &'static str,
}

pub const SPECIALISTS: &[Specialist] = &[
    Specialist {
        name: "Dr. Anya Sharma - Pulmonologist",
        role: "Specialist in respiratory diseases",
    },
    Specialist {
        name: "Dr. Ben Carter",
        role: "General Physician",
    },
];

/// Titled prevention list for one condition
pub struct PreventionSteps {
    pub title: &'static str,
    pub steps: &'static [&'static str],
}

pub fn prevention_steps(prediction: Prediction) -> PreventionSteps {
    match prediction {
        Prediction::Healthy => PreventionSteps {
            title: "Healthy Individuals - General Prevention (5 Steps)",
            steps: &[
                "Maintain good air quality by avoiding polluted or smoky environments whenever possible.",
                "Practice regular hand hygiene to reduce exposure to germs and infections.",
                "Engage in regular physical activity to support lung strength and overall health.",
                "Avoid smoking and exposure to secondhand smoke.",
                "Ensure adequate rest, hydration, and a balanced diet to support immune function.",
            ],
        },
        Prediction::Copd => PreventionSteps {
            title: "COPD - General Prevention & Management (5 Steps)",
            steps: &[
                "Avoid smoking completely and minimize exposure to air pollutants and dust.",
                "Follow prescribed treatments and attend regular medical checkups.",
                "Practice breathing exercises to improve lung efficiency.",
                "Maintain vaccinations to prevent respiratory infections.",
                "Monitor symptoms closely and seek medical advice if breathing worsens.",
            ],
        },
        Prediction::Pneumonia => PreventionSteps {
            title: "Pneumonia - General Prevention (5 Steps)",
            steps: &[
                "Practice good hygiene, including frequent handwashing and mask use when necessary.",
                "Keep vaccinations up to date as recommended by healthcare professionals.",
                "Avoid close contact with individuals who have respiratory infections.",
                "Maintain good nutrition and hydration to strengthen the immune system.",
                "Seek early medical attention if symptoms such as fever, cough, or chest pain appear.",
            ],
        },
    }
}

/// 0.87 -> "87.0%"
pub fn format_percent(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Bytes -> "2.29"
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0 / 1024.0)
}

pub fn headline(prediction: Prediction) -> &'static str {
    match prediction {
        Prediction::Healthy => "Healthy Patient",
        Prediction::Copd | Prediction::Pneumonia => "Disease Detected",
    }
}

pub fn detail_line(prediction: Prediction) -> String {
    match prediction {
        Prediction::Healthy => "No abnormalities detected in the respiratory sound.".to_string(),
        Prediction::Copd | Prediction::Pneumonia => format!("{} detected.", prediction.label()),
    }
}

/// Result panel for one prediction
pub fn render_prediction(result: &PredictionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", headline(result.prediction));
    let _ = writeln!(out, "{}", detail_line(result.prediction));
    let _ = writeln!(out, "Confidence: {}", format_percent(result.confidence));

    if !result.prediction.is_healthy() {
        out.push('\n');
        out.push_str("Recommended Actions\n");
        out.push_str("  Consult a specialist immediately\n");
        out.push_str("  Schedule an appointment with a pulmonologist for further evaluation.\n");
        out.push('\n');
        out.push_str("Available Specialists\n");
        for specialist in SPECIALISTS {
            let _ = writeln!(out, "  {} ({})", specialist.name, specialist.role);
        }
    }

    let prevention = prevention_steps(result.prediction);
    out.push('\n');
    out.push_str("Steps to Prevent\n");
    let _ = writeln!(out, "{}", prevention.title);
    for (i, step) in prevention.steps.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, step);
    }
    out
}

/// Progress line, shown only while progress is above zero
pub fn render_progress(session: &UploadSession) -> Option<String> {
    (session.progress > 0).then(|| format!("Uploading... {}%", session.progress))
}

/// The upload area and results panel for the current session
pub fn render_session(session: &UploadSession) -> String {
    let mut out = String::new();

    if let Some(progress) = render_progress(session) {
        let _ = writeln!(out, "{progress}");
    }

    if let Some(message) = session.error_message() {
        let _ = writeln!(out, "{ERROR_TITLE}");
        let _ = writeln!(out, "{message}");
        return out;
    }

    if session.in_flight {
        out.push_str("Analyzing audio file...\n");
        return out;
    }

    match &session.prediction {
        Some(result) => {
            let _ = writeln!(out, "{SUCCESS_BANNER}");
            if let Some(warning) = &session.save_warning {
                let _ = writeln!(out, "Note: {warning}");
            }
            out.push('\n');
            out.push_str(&render_prediction(result));
        }
        None => {
            let _ = writeln!(out, "{PLACEHOLDER}");
        }
    }
    out
}

/// One history row:
/// ```text
/// cough.wav (2.29 MB)
///   Mar 4, 2026 • 87.0% confidence
///   [Copd]
/// ```
pub fn render_history_entry(entry: &HistoryEntry) -> String {
    format!(
        "{} ({} MB)\n  {} • {} confidence\n  [{}]\n",
        entry.file_name,
        format_megabytes(entry.file_size),
        entry.date,
        format_percent(entry.confidence),
        entry.status
    )
}

pub fn render_history(view: &HistoryView) -> String {
    let mut out = String::from("Recent Test History\n");
    if view.loading {
        out.push_str("Loading history...\n");
    } else if view.entries.is_empty() {
        out.push_str("No test history available\n");
        out.push_str("Upload an audio file to see your analysis history\n");
    } else {
        for entry in &view.entries {
            out.push_str(&render_history_entry(entry));
        }
    }
    out
}

/// Analysis report for one history entry
pub fn render_report(entry: &HistoryEntry) -> String {
    let mut out = String::from("Analysis Report\n");
    let _ = writeln!(out, "File Name: {}", entry.file_name);
    let _ = writeln!(out, "Upload Date: {}", entry.date);
    let size = if entry.file_size > 0 {
        format!("{} MB", format_megabytes(entry.file_size))
    } else {
        "N/A".to_string()
    };
    let _ = writeln!(out, "File Size: {size}");
    if let Some(duration) = entry.duration {
        let _ = writeln!(out, "Duration: {duration:.1} seconds");
    }
    let _ = writeln!(out, "Analysis Result: {}", entry.status);
    let _ = writeln!(out, "Confidence: {}", format_percent(entry.confidence));
    out.push('\n');
    let _ = writeln!(out, "{DISCLAIMER}");
    out
}
