//! # Message Builder
//!
//! Pure text generation for the IVR: tiered collection scripts keyed by
//! days past due, digit- and tier-specific acknowledgments, the no-input
//! farewell, and the agent directory used by the live-transfer path.
//!
//! Everything here is deterministic for a given client record and clock
//! reading; no I/O, no state.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Timelike, Utc};

use crate::campaign::types::ClientTarget;
use crate::config::ScriptConfig;

/// Escalation tier derived from days past due. Never stored; always a pure
/// function of the client record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArrearsTier {
    /// <= 15 days
    Reminder,
    /// 16..=30 days
    Urgent,
    /// 31..=60 days
    Pressure,
    /// > 60 days
    Legal,
}

impl ArrearsTier {
    pub fn for_days(days_past_due: u32) -> Self {
        match days_past_due {
            0..=15 => Self::Reminder,
            16..=30 => Self::Urgent,
            31..=60 => Self::Pressure,
            _ => Self::Legal,
        }
    }

    /// Urgency rank, monotone in days past due
    pub fn urgency(&self) -> u8 {
        match self {
            Self::Reminder => 1,
            Self::Urgent => 2,
            Self::Pressure => 3,
            Self::Legal => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Reminder => "NIVEL 1 - Recordatorio",
            Self::Urgent => "NIVEL 2 - Urgente",
            Self::Pressure => "NIVEL 3 - Presión",
            Self::Legal => "NIVEL 4 - Legal",
        }
    }
}

const MENU_OPTIONS: &str = "Para hacer una promesa de pago, marque 1. \
     Para hablar con su gestor, marque 2. Si ya realizó su pago, marque 3.";

/// Builds every spoken text the IVR plays
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    agency: String,
    creditor: String,
    agents: HashMap<String, String>,
    default_agent_phone: String,
    local_offset: FixedOffset,
}

impl MessageBuilder {
    pub fn new(script: &ScriptConfig, local_offset: FixedOffset) -> Self {
        Self {
            agency: script.agency_name.clone(),
            creditor: script.creditor_name.clone(),
            agents: script.agents.clone(),
            default_agent_phone: script.default_agent_phone.clone(),
            local_offset,
        }
    }

    /// Main collection script played after answer, escalating with the
    /// arrears tier and ending with the DTMF menu.
    pub fn main_script(&self, client: &ClientTarget, now: DateTime<Utc>) -> String {
        let greeting = self.greeting(now);
        let name = sanitize_name(&client.name);
        let short = short_name(&name);
        let balance = format_amount(client.balance);
        let minimum = format_amount(client.minimum_payment);
        let days = client.days_past_due;
        let agency = &self.agency;
        let creditor = &self.creditor;

        match ArrearsTier::for_days(days) {
            ArrearsTier::Reminder => format!(
                "{greeting}. ¿Hablo con {name}? Le llamamos de {agency}. {creditor} nos ha \
                 solicitado contactarle respecto a su pagaré, el cual presenta un saldo de \
                 {balance} pesos con {days} días de atraso. {short}, su pago mínimo es de \
                 {minimum} pesos. Le invitamos a regularizar su situación para evitar cargos \
                 adicionales. {MENU_OPTIONS}"
            ),
            ArrearsTier::Urgent => format!(
                "{greeting}. ¿Hablo con {name}? Le llamamos de {agency} en carácter de urgente. \
                 {creditor} asignó su pagaré para cobro por un adeudo de {balance} pesos. \
                 {short}, su cuenta tiene {days} días de atraso y esto está generando intereses \
                 y afectación a su historial crediticio. Su pago mínimo es de {minimum} pesos. \
                 Es importante que regularice su situación a la brevedad. {MENU_OPTIONS}"
            ),
            ArrearsTier::Pressure => format!(
                "{greeting}. Esta llamada es para {name}. Le comunicamos de {agency}, despacho \
                 de cobranza autorizado por {creditor}. Su pagaré presenta un adeudo vencido de \
                 {balance} pesos con {days} días de atraso. {short}, le informamos que de no \
                 regularizar su cuenta, se procederá con las acciones de cobro correspondientes \
                 conforme a la ley. Su pago mínimo para evitar esto es de {minimum} pesos. \
                 {MENU_OPTIONS}"
            ),
            ArrearsTier::Legal => format!(
                "{greeting}. Esta llamada va dirigida a {name}. Le comunicamos de {agency}, \
                 despacho de cobranza legal autorizado por {creditor}. Su pagaré con un adeudo \
                 de {balance} pesos se encuentra vencido con {days} días de atraso. {short}, \
                 esta es una notificación formal. Su expediente está en proceso de ser turnado \
                 al área legal para iniciar las gestiones de cobro que correspondan. Aún está a \
                 tiempo de evitar costos adicionales. Su pago mínimo es de {minimum} pesos. \
                 {MENU_OPTIONS}"
            ),
        }
    }

    /// Spoken acknowledgment for a captured digit, varying with the tier
    pub fn acknowledgment(&self, digit: char, client: &ClientTarget) -> String {
        let name = sanitize_name(&client.name);
        let short = short_name(&name).to_string();
        let short = if short.is_empty() {
            "Cliente".to_string()
        } else {
            short
        };
        let tier = ArrearsTier::for_days(client.days_past_due);

        match digit {
            '1' => match tier {
                ArrearsTier::Reminder => format!(
                    "Gracias {short}. Hemos registrado su promesa de pago. Un gestor le \
                     contactará para confirmar los detalles y apoyarle con su proceso. Que \
                     tenga buen día."
                ),
                ArrearsTier::Urgent => format!(
                    "{short}, hemos registrado su promesa de pago. Es muy importante que cumpla \
                     con el compromiso para evitar que su caso escale. Un gestor le contactará \
                     pronto para confirmar. Hasta luego."
                ),
                _ => format!(
                    "{short}, queda registrada su promesa de pago. Le recordamos que el \
                     incumplimiento de esta promesa podría acelerar las acciones de cobro. Un \
                     gestor le contactará para formalizar el acuerdo. Hasta luego."
                ),
            },
            '2' => format!(
                "Entendido {short}. Lo estamos comunicando con su gestor asignado. Por favor \
                 no cuelgue."
            ),
            '3' => match tier {
                ArrearsTier::Reminder | ArrearsTier::Urgent => format!(
                    "Gracias {short}. Registramos que ya realizó su pago. Lo verificaremos en \
                     nuestro sistema y se actualizará su cuenta. Buen día."
                ),
                _ => format!(
                    "{short}, tomamos nota de que indica haber realizado su pago. Nuestro \
                     equipo lo verificará. Si el pago no se confirma en las próximas 48 horas, \
                     se continuará con el proceso de cobro. Hasta luego."
                ),
            },
            _ => format!(
                "{short}, no recibimos una opción válida. Un gestor se pondrá en contacto con \
                 usted. Hasta luego."
            ),
        }
    }

    /// Farewell when the gather times out with no keypress
    pub fn no_input_script(&self) -> String {
        "No recibimos su respuesta. Le volveremos a contactar. Hasta luego.".to_string()
    }

    /// Agent phone for a promoter, falling back to the configured default
    pub fn agent_phone(&self, promoter: &str) -> &str {
        self.agents
            .get(promoter.trim())
            .map(String::as_str)
            .unwrap_or(&self.default_agent_phone)
    }

    fn greeting(&self, now: DateTime<Utc>) -> &'static str {
        let hour = now.with_timezone(&self.local_offset).hour();
        if hour < 12 {
            "Buenos días"
        } else if hour < 19 {
            "Buenas tardes"
        } else {
            "Buenas noches"
        }
    }
}

/// Strip panel markup characters that would be read aloud by the TTS
fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '°' | '•' | '*' | '"' | '\\' | '#'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// First whitespace-delimited token of a sanitized name
fn short_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or("")
}

/// Whole-peso amount with thousands separators (es-MX style)
fn format_amount(value: f64) -> String {
    let whole = value.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if whole < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn builder() -> MessageBuilder {
        let mut script = ScriptConfig::default();
        script
            .agents
            .insert("Nery".to_string(), "+525521975037".to_string());
        script.default_agent_phone = "+525515838763".to_string();
        MessageBuilder::new(&script, FixedOffset::east_opt(0).unwrap())
    }

    fn client(days: u32) -> ClientTarget {
        ClientTarget {
            name: "María° Elena* Ruiz".to_string(),
            phone: "+525512345678".to_string(),
            balance: 15750.4,
            minimum_payment: 2300.0,
            days_past_due: days,
            promoter: "Nery".to_string(),
        }
    }

    #[test]
    fn tier_boundaries_are_inclusive_lower_exclusive_upper() {
        assert_eq!(ArrearsTier::for_days(0), ArrearsTier::Reminder);
        assert_eq!(ArrearsTier::for_days(15), ArrearsTier::Reminder);
        assert_eq!(ArrearsTier::for_days(16), ArrearsTier::Urgent);
        assert_eq!(ArrearsTier::for_days(30), ArrearsTier::Urgent);
        assert_eq!(ArrearsTier::for_days(31), ArrearsTier::Pressure);
        assert_eq!(ArrearsTier::for_days(60), ArrearsTier::Pressure);
        assert_eq!(ArrearsTier::for_days(61), ArrearsTier::Legal);
    }

    proptest! {
        #[test]
        fn urgency_is_monotone_in_days(a in 0u32..400, b in 0u32..400) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                ArrearsTier::for_days(lo).urgency() <= ArrearsTier::for_days(hi).urgency()
            );
        }

        #[test]
        fn tier_is_pure(d in 0u32..400) {
            prop_assert_eq!(ArrearsTier::for_days(d), ArrearsTier::for_days(d));
        }
    }

    #[test]
    fn greeting_follows_local_cutoffs() {
        let b = builder();
        let morning = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let afternoon = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap();
        assert_eq!(b.greeting(morning), "Buenos días");
        assert_eq!(b.greeting(afternoon), "Buenas tardes");
        assert_eq!(b.greeting(evening), "Buenas noches");
    }

    #[test]
    fn name_markup_is_stripped() {
        assert_eq!(sanitize_name("María° Elena* Ruiz\"#"), "María Elena Ruiz");
    }

    #[test]
    fn amounts_are_grouped() {
        assert_eq!(format_amount(15750.4), "15,750");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1_234_567.0), "1,234,567");
    }

    #[test]
    fn main_script_interpolates_client_and_menu() {
        let b = builder();
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let script = b.main_script(&client(10), now);
        assert!(script.contains("María Elena Ruiz"));
        assert!(script.contains("15,750 pesos"));
        assert!(script.contains("10 días"));
        assert!(script.contains("marque 1"));
        assert!(!script.contains('°'));
    }

    #[test]
    fn promise_acknowledgment_wording_varies_by_tier() {
        let b = builder();
        let early = b.acknowledgment('1', &client(10));
        let late = b.acknowledgment('1', &client(45));
        assert_ne!(early, late);
        assert!(early.contains("Gracias"));
        assert!(late.contains("acelerar las acciones de cobro"));
    }

    #[test]
    fn unknown_digit_yields_invalid_selection_text() {
        let b = builder();
        let text = b.acknowledgment('7', &client(10));
        assert!(text.contains("no recibimos una opción válida"));
    }

    #[test]
    fn agent_directory_resolves_with_default_fallback() {
        let b = builder();
        assert_eq!(b.agent_phone("Nery"), "+525521975037");
        assert_eq!(b.agent_phone(" Nery "), "+525521975037");
        assert_eq!(b.agent_phone("Desconocido"), "+525515838763");
    }
}
