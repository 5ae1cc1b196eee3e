pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS frame_analysis (
        id INTEGER PRIMARY KEY,
        video_id TEXT NOT NULL,
        frame_ms INTEGER NOT NULL,
        description TEXT NOT NULL,
        source_name TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_frame_analysis_video_time
        ON frame_analysis (video_id, frame_ms);

    CREATE TRIGGER IF NOT EXISTS frame_analysis_no_update
        BEFORE UPDATE ON frame_analysis
    BEGIN
        SELECT RAISE(ABORT, 'frame_analysis is append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS frame_analysis_no_delete
        BEFORE DELETE ON frame_analysis
    BEGIN
        SELECT RAISE(ABORT, 'frame_analysis is append-only');
    END;
";
