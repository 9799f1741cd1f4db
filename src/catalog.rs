use crate::models::EventCode;

const ENTRIES: [(EventCode, &str); 13] = [
    (16, "Antena Violada"),
    (25, "Bateria Violada"),
    (28, "Engate e desengate violado"),
    (6, "Desvio de Rota"),
    (10, "Movimento Indevido"),
    (47, "Perda de Sinal"),
    (29, "Porta do Caroneiro Aberta/Violada"),
    (30, "Porta do Motorista Aberta/Violada"),
    (15, "Teclado Violado"),
    (32, "Velocidade Violada"),
    (26, "Violação do Sensor da Porta do Baú"),
    (22, "Violação dos Sensores das janelas"),
    (56, "Parada não autorizada"),
];

/// Fixed lookup from telemetry event code to display name.
#[derive(Debug, Clone, Copy)]
pub struct EventCatalog {
    entries: &'static [(EventCode, &'static str)],
}

impl Default for EventCatalog {
    fn default() -> Self {
        Self { entries: &ENTRIES }
    }
}

impl EventCatalog {
    pub fn name_for(&self, code: EventCode) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(entry_code, _)| *entry_code == code)
            .map(|(_, name)| *name)
    }

    pub fn contains(&self, code: EventCode) -> bool {
        self.name_for(code).is_some()
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (EventCode, &'static str)> + '_ {
        self.entries.iter().copied()
    }
}
